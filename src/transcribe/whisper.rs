//! Whisper-based speech-to-text backend
//!
//! Uses whisper.cpp via the whisper-rs crate for fast, local transcription.
//! The context is created lazily on `load` and dropped on `unload`, so a
//! constructed-but-unloaded backend holds no model memory.

use super::Backend;
use crate::audio;
use crate::config::WhisperConfig;
use crate::error::TranscribeError;
use std::path::{Path, PathBuf};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Whisper-based backend
pub struct WhisperBackend {
    /// Requested model identifier (e.g. "whisper-base.en")
    identifier: String,
    /// Directory searched for ggml model files
    models_dir: PathBuf,
    /// Language for transcription
    language: String,
    /// Whether to translate to English
    translate: bool,
    /// Number of threads to use
    threads: usize,
    /// Whisper context (holds the model); None while unloaded
    ctx: Option<WhisperContext>,
}

impl WhisperBackend {
    /// Create a new, not-yet-loaded whisper backend
    pub fn new(identifier: &str, config: &WhisperConfig, models_dir: &Path) -> Self {
        let threads = config.threads.unwrap_or_else(|| num_cpus::get().min(4));

        Self {
            identifier: identifier.to_string(),
            models_dir: models_dir.to_path_buf(),
            language: config.language.clone(),
            translate: config.translate,
            threads,
            ctx: None,
        }
    }

    /// Run inference on prepared samples (f32, mono, 16kHz)
    fn run(&self, samples: &[f32]) -> Result<String, TranscribeError> {
        let ctx = self.ctx.as_ref().ok_or(TranscribeError::NotLoaded)?;

        let duration_secs = samples.len() as f32 / audio::TARGET_SAMPLE_RATE as f32;
        tracing::debug!(
            "Transcribing {:.2}s of audio ({} samples)",
            duration_secs,
            samples.len()
        );

        let start = std::time::Instant::now();

        let mut state = ctx
            .create_state()
            .map_err(|e| TranscribeError::TranscriptionFailed(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        // "auto" maps to None to enable language auto-detection
        if self.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.language));
        }

        params.set_translate(self.translate);
        params.set_n_threads(self.threads as i32);

        // Disable output we don't need
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        // Improve transcription quality
        params.set_suppress_blank(true);
        params.set_suppress_nst(true);

        // For short recordings, use single segment mode
        if duration_secs < 30.0 {
            params.set_single_segment(true);
        }

        // Optimize context window for short clips
        if let Some(audio_ctx) = calculate_audio_ctx(duration_secs) {
            params.set_audio_ctx(audio_ctx);
            tracing::debug!(
                "Audio context optimization: audio_ctx={} for {:.2}s clip",
                audio_ctx,
                duration_secs
            );
        }

        state
            .full(params, samples)
            .map_err(|e| TranscribeError::TranscriptionFailed(e.to_string()))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(
                segment
                    .to_str()
                    .map_err(|e| TranscribeError::TranscriptionFailed(e.to_string()))?,
            );
        }

        let result = text.trim().to_string();

        tracing::info!(
            "Transcription completed in {:.2}s ({} chars)",
            start.elapsed().as_secs_f32(),
            result.chars().count()
        );

        Ok(result)
    }
}

impl Backend for WhisperBackend {
    fn load(&mut self) -> Result<(), TranscribeError> {
        if self.ctx.is_some() {
            tracing::debug!("Whisper model already loaded");
            return Ok(());
        }

        let model_path = resolve_model_path(&self.identifier, &self.models_dir)?;

        tracing::info!("Loading whisper model from {:?}", model_path);
        let start = std::time::Instant::now();

        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| TranscribeError::ModelNotFound("Invalid path".to_string()))?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| TranscribeError::LoadFailed(e.to_string()))?;

        tracing::info!("Model loaded in {:.2}s", start.elapsed().as_secs_f32());

        self.ctx = Some(ctx);
        Ok(())
    }

    fn unload(&mut self) {
        if self.ctx.take().is_some() {
            tracing::info!("Whisper model unloaded");
        }
    }

    fn transcribe_pcm(
        &mut self,
        pcm: &[u8],
        sample_rate: u32,
        channels: u16,
    ) -> Result<String, TranscribeError> {
        if pcm.is_empty() {
            return Ok(String::new());
        }

        let samples = audio::pcm_to_f32(pcm)?;
        let prepared = audio::prepare(&samples, sample_rate, channels)?;
        self.run(&prepared)
    }

    fn transcribe_encoded(&mut self, bytes: &[u8]) -> Result<String, TranscribeError> {
        if bytes.is_empty() {
            return Ok(String::new());
        }

        if self.ctx.is_none() {
            self.load()?;
        }

        let (samples, sample_rate, channels) = audio::decode_wav(bytes)?;
        let prepared = audio::prepare(&samples, sample_rate, channels)?;
        self.run(&prepared)
    }

    fn device_description(&self) -> &'static str {
        if cfg!(feature = "gpu-vulkan") {
            "GPU (Vulkan)"
        } else if cfg!(feature = "gpu-cuda") {
            "GPU (CUDA)"
        } else if cfg!(feature = "gpu-metal") {
            "GPU (Metal)"
        } else if cfg!(feature = "gpu-hipblas") {
            "GPU (hipBLAS)"
        } else {
            "CPU"
        }
    }

    fn is_loaded(&self) -> bool {
        self.ctx.is_some()
    }
}

/// Resolve a model identifier to a ggml model file path
///
/// Accepts an absolute path to a .bin file, a bare whisper size name
/// ("base.en"), or a family-prefixed identifier ("whisper-base.en").
fn resolve_model_path(identifier: &str, models_dir: &Path) -> Result<PathBuf, TranscribeError> {
    // If it's already an absolute path, use it directly
    let path = PathBuf::from(identifier);
    if path.is_absolute() && path.exists() {
        return Ok(path);
    }

    // Strip the family prefix the registry matched on
    let name = identifier
        .strip_prefix("whisper-")
        .unwrap_or(identifier);

    let model_filename = match name {
        "tiny" => "ggml-tiny.bin",
        "tiny.en" => "ggml-tiny.en.bin",
        "base" => "ggml-base.bin",
        "base.en" => "ggml-base.en.bin",
        "small" => "ggml-small.bin",
        "small.en" => "ggml-small.en.bin",
        "medium" => "ggml-medium.bin",
        "medium.en" => "ggml-medium.en.bin",
        "large" | "large-v1" => "ggml-large-v1.bin",
        "large-v2" => "ggml-large-v2.bin",
        "large-v3" => "ggml-large-v3.bin",
        "large-v3-turbo" => "ggml-large-v3-turbo.bin",
        // If it looks like a filename, use it as-is
        other if other.ends_with(".bin") => other,
        other => {
            return Err(TranscribeError::ModelNotFound(format!(
                "Unknown whisper model: '{}'. Valid models: tiny, base, small, medium, large-v3, large-v3-turbo",
                other
            )));
        }
    };

    let model_path = models_dir.join(model_filename);
    if model_path.exists() {
        return Ok(model_path);
    }

    // Also check ./models/
    let local_models_path = PathBuf::from("models").join(model_filename);
    if local_models_path.exists() {
        return Ok(local_models_path);
    }

    Err(TranscribeError::ModelNotFound(format!(
        "Model '{}' not found. Looked in:\n  - {}\n  - {}\n\nDownload from: https://huggingface.co/ggerganov/whisper.cpp/tree/main",
        identifier,
        model_path.display(),
        local_models_path.display()
    )))
}

/// Calculate audio_ctx parameter for short clips (≤22.5s).
/// Formula: duration_seconds * 50 + 64
fn calculate_audio_ctx(duration_secs: f32) -> Option<i32> {
    if duration_secs <= 22.5 {
        Some((duration_secs * 50.0) as i32 + 64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn resolve_strips_family_prefix() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("ggml-base.en.bin"), b"dummy").unwrap();

        let resolved = resolve_model_path("whisper-base.en", temp_dir.path()).unwrap();
        assert_eq!(resolved, temp_dir.path().join("ggml-base.en.bin"));
    }

    #[test]
    fn resolve_accepts_bare_size_name() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("ggml-tiny.bin"), b"dummy").unwrap();

        let resolved = resolve_model_path("tiny", temp_dir.path()).unwrap();
        assert_eq!(resolved, temp_dir.path().join("ggml-tiny.bin"));
    }

    #[test]
    fn resolve_rejects_unknown_size() {
        let temp_dir = TempDir::new().unwrap();
        let err = resolve_model_path("whisper-gigantic", temp_dir.path()).unwrap_err();
        assert!(matches!(err, TranscribeError::ModelNotFound(_)));
    }

    #[test]
    fn resolve_reports_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = resolve_model_path("base.en", temp_dir.path()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("base.en"), "got: {msg}");
    }

    #[test]
    fn audio_ctx_only_for_short_clips() {
        assert_eq!(calculate_audio_ctx(10.0), Some(564));
        assert_eq!(calculate_audio_ctx(30.0), None);
    }

    #[test]
    fn constructed_backend_is_unloaded() {
        let backend = WhisperBackend::new(
            "whisper-base.en",
            &WhisperConfig::default(),
            Path::new("/nonexistent"),
        );
        assert!(!backend.is_loaded());
    }

    #[test]
    fn unload_is_idempotent_when_never_loaded() {
        let mut backend = WhisperBackend::new(
            "whisper-base.en",
            &WhisperConfig::default(),
            Path::new("/nonexistent"),
        );
        backend.unload();
        backend.unload();
        assert!(!backend.is_loaded());
    }

    #[test]
    fn empty_pcm_short_circuits_without_model() {
        let mut backend = WhisperBackend::new(
            "whisper-base.en",
            &WhisperConfig::default(),
            Path::new("/nonexistent"),
        );
        // No model on disk, but empty input never reaches the pipeline
        assert_eq!(backend.transcribe_pcm(&[], 48000, 1).unwrap(), "");
    }

    #[test]
    fn pcm_without_load_does_not_auto_load() {
        let mut backend = WhisperBackend::new(
            "whisper-base.en",
            &WhisperConfig::default(),
            Path::new("/nonexistent"),
        );
        let pcm = [0u8; 64];
        let err = backend.transcribe_pcm(&pcm, 48000, 1).unwrap_err();
        assert!(matches!(err, TranscribeError::NotLoaded));
    }
}
