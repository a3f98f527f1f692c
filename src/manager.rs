//! Model manager: owns the single active backend
//!
//! The manager is the only component that holds a backend reference, and
//! it is only ever driven from the command loop's single task, so there
//! is no locking — exclusive ownership is the concurrency control.
//!
//! Every backend failure mode, including panics, is converted to a
//! structured result at this boundary. The command loop never sees a
//! propagating failure, and the unload/cleanup path cannot fail at all:
//! it reports what happened but always completes.

use crate::error::TranscribeError;
use crate::registry::BackendFactory;
use crate::transcribe::Backend;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The currently loaded backend and the identifier that produced it
struct ActiveModel {
    name: String,
    backend: Box<dyn Backend>,
}

/// Owns at most one active transcription backend
pub struct ModelManager {
    factory: Box<dyn BackendFactory>,
    active: Option<ActiveModel>,
}

/// Result of an unload/cleanup pass
///
/// Deliberately not an error type: teardown either completes or completes
/// with a recorded warning. It runs during process shutdown, where a
/// propagating failure would turn a clean exit into a crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnloadOutcome {
    /// A model was resident and its resources were released
    Unloaded,
    /// Nothing was loaded; the call was a no-op
    NothingLoaded,
    /// Release was interrupted or failed partway; resources were dropped
    /// as far as possible
    BestEffort(String),
}

impl fmt::Display for UnloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnloadOutcome::Unloaded => write!(f, "Model unloaded successfully"),
            UnloadOutcome::NothingLoaded => write!(f, "No model to unload"),
            UnloadOutcome::BestEffort(detail) => {
                write!(f, "Unload best-effort with error: {}", detail)
            }
        }
    }
}

impl ModelManager {
    /// Create an empty manager using the given backend factory
    pub fn new(factory: Box<dyn BackendFactory>) -> Self {
        ModelManager {
            factory,
            active: None,
        }
    }

    /// Construct and load the backend for `identifier`, making it active
    ///
    /// The previous backend (if any) is kept until the new one has fully
    /// constructed and loaded; only then is its reference dropped. On any
    /// failure the previous backend stays active and the partially
    /// initialized new one is discarded — the manager never retains a
    /// half-loaded backend.
    pub fn load_model(&mut self, identifier: &str) -> Result<String, TranscribeError> {
        tracing::info!("Loading model '{}'", identifier);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut backend = self.factory.create(identifier)?;
            backend.load()?;
            Ok::<_, TranscribeError>(backend)
        }));

        match result {
            Ok(Ok(backend)) => {
                if let Some(previous) = self.active.take() {
                    tracing::info!(
                        "Replacing active model '{}' with '{}'",
                        previous.name,
                        identifier
                    );
                }
                self.active = Some(ActiveModel {
                    name: identifier.to_string(),
                    backend,
                });
                Ok(format!("Loaded model '{}'", identifier))
            }
            Ok(Err(e)) => {
                tracing::warn!("Model load failed: {}", e);
                Err(e)
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                tracing::error!("Backend panicked during load: {}", detail);
                Err(TranscribeError::LoadFailed(format!(
                    "backend panicked: {}",
                    detail
                )))
            }
        }
    }

    /// Transcribe raw s16le PCM through the active backend
    pub fn transcribe_raw(
        &mut self,
        pcm: &[u8],
        sample_rate: u32,
        channels: u16,
    ) -> Result<String, TranscribeError> {
        let active = self.active.as_mut().ok_or(TranscribeError::NotLoaded)?;

        if pcm.is_empty() {
            return Ok(String::new());
        }

        let result = catch_unwind(AssertUnwindSafe(|| {
            active.backend.transcribe_pcm(pcm, sample_rate, channels)
        }));
        finish_transcription(result)
    }

    /// Transcribe an encoded audio blob through the active backend
    pub fn transcribe_encoded(&mut self, bytes: &[u8]) -> Result<String, TranscribeError> {
        let active = self.active.as_mut().ok_or(TranscribeError::NotLoaded)?;

        if bytes.is_empty() {
            return Ok(String::new());
        }

        let result = catch_unwind(AssertUnwindSafe(|| {
            active.backend.transcribe_encoded(bytes)
        }));
        finish_transcription(result)
    }

    /// Release the active backend, if any
    ///
    /// Idempotent and unconditionally non-failing: this runs on the
    /// shutdown path, so a misbehaving backend (panicking unload,
    /// panicking drop) is absorbed and reported as a best-effort outcome.
    pub fn unload_model(&mut self) -> UnloadOutcome {
        let Some(active) = self.active.take() else {
            return UnloadOutcome::NothingLoaded;
        };

        let name = active.name.clone();
        // Drop runs inside the guard too: release failures in destructors
        // must not escape either.
        let result = catch_unwind(AssertUnwindSafe(move || {
            let mut active = active;
            active.backend.unload();
        }));

        match result {
            Ok(()) => {
                tracing::info!("Unloaded model '{}'", name);
                UnloadOutcome::Unloaded
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                tracing::warn!(
                    "Best-effort unload of model '{}' hit an error: {}",
                    name,
                    detail
                );
                UnloadOutcome::BestEffort(detail)
            }
        }
    }

    /// Release everything the manager holds; invoked on every exit path
    ///
    /// Dropping the backend is the process-wide reclamation step in Rust;
    /// like `unload_model` this cannot fail.
    pub fn cleanup(&mut self) -> UnloadOutcome {
        let outcome = self.unload_model();
        tracing::debug!("Cleanup complete");
        outcome
    }

    /// Whether a backend is currently active
    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    /// Identifier of the active model, if any
    pub fn active_model(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.name.as_str())
    }

    /// Human-readable status line for the `status` command
    pub fn status(&self) -> String {
        match &self.active {
            Some(active) => format!(
                "Model '{}' loaded on {}",
                active.name,
                active.backend.device_description()
            ),
            None => "No model loaded".to_string(),
        }
    }
}

/// Map a guarded transcription result onto the error taxonomy
fn finish_transcription(
    result: std::thread::Result<Result<String, TranscribeError>>,
) -> Result<String, TranscribeError> {
    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(wrap_backend_error(e)),
        Err(payload) => Err(TranscribeError::TranscriptionFailed(format!(
            "backend panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

/// Wrap backend failures so callers always see a transcription failure
/// carrying the backend's reason text
fn wrap_backend_error(e: TranscribeError) -> TranscribeError {
    match e {
        TranscribeError::TranscriptionFailed(_) => e,
        other => TranscribeError::TranscriptionFailed(other.to_string()),
    }
}

/// Extract a printable message from a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
