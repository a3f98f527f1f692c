//! Speech-to-text backends
//!
//! Provides transcription via:
//! - Local whisper.cpp inference (whisper-rs crate)
//! - NVIDIA Parakeet via ONNX Runtime (parakeet-rs crate, `parakeet` feature)
//!
//! Every backend owns its model lifecycle: construction is cheap and does
//! no model loading; `load` does the heavy work and is idempotent;
//! `unload` is best-effort and never fails. Backends are exclusively owned
//! by the model manager, so methods take `&mut self` and no interior
//! locking is needed.

pub mod whisper;

#[cfg(feature = "parakeet")]
pub mod parakeet;

use crate::error::TranscribeError;

/// Capability contract for speech-to-text backends
pub trait Backend: Send {
    /// Load the model into memory. Idempotent: a no-op when already
    /// loaded. On failure the backend stays unloaded.
    fn load(&mut self) -> Result<(), TranscribeError>;

    /// Release the model. Best-effort: internal release failures are
    /// swallowed, and the loaded flag is always false afterwards.
    fn unload(&mut self);

    /// Transcribe raw little-endian signed 16-bit PCM. The backend
    /// downmixes and resamples internally. Empty input returns an empty
    /// transcript without touching the inference pipeline. Does not
    /// auto-load.
    fn transcribe_pcm(
        &mut self,
        pcm: &[u8],
        sample_rate: u32,
        channels: u16,
    ) -> Result<String, TranscribeError>;

    /// Transcribe a complete, self-describing encoded audio blob (WAV).
    /// Loads the model first if it is not yet loaded. Empty input returns
    /// an empty transcript.
    fn transcribe_encoded(&mut self, bytes: &[u8]) -> Result<String, TranscribeError>;

    /// Human-readable description of the compute placement. Pure.
    fn device_description(&self) -> &'static str;

    /// Whether the model is currently resident. Pure.
    fn is_loaded(&self) -> bool;
}

impl std::fmt::Debug for dyn Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("device", &self.device_description())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
