//! Parakeet-based speech-to-text backend
//!
//! Uses NVIDIA's Parakeet model via the parakeet-rs crate (ONNX Runtime).
//! Only available when the `parakeet` feature is enabled.
//!
//! Supports two model architectures:
//! - CTC (Connectionist Temporal Classification): faster, character-level output
//! - TDT (Token-Duration-Transducer): recommended, proper punctuation and word boundaries

use super::Backend;
use crate::audio;
use crate::config::{ParakeetConfig, ParakeetModelType};
use crate::error::TranscribeError;
#[cfg(any(
    feature = "parakeet-cuda",
    feature = "parakeet-rocm",
    feature = "parakeet-tensorrt"
))]
use parakeet_rs::ExecutionProvider;
use parakeet_rs::{
    ExecutionConfig, Parakeet, ParakeetTDT, Transcriber as ParakeetTranscriberTrait,
};
use std::path::{Path, PathBuf};

/// Holds either a CTC or TDT model instance
enum ParakeetModel {
    Ctc(Parakeet),
    Tdt(ParakeetTDT),
}

/// Parakeet-based backend using ONNX Runtime
pub struct ParakeetBackend {
    /// Requested model identifier (e.g. "parakeet-tdt-0.6b-v3")
    identifier: String,
    /// Directory searched for model directories
    models_dir: PathBuf,
    /// Architecture override from config; auto-detected when None
    model_type_override: Option<ParakeetModelType>,
    /// Model instance; None while unloaded
    model: Option<ParakeetModel>,
}

impl ParakeetBackend {
    /// Create a new, not-yet-loaded parakeet backend
    pub fn new(identifier: &str, config: &ParakeetConfig, models_dir: &Path) -> Self {
        Self {
            identifier: identifier.to_string(),
            models_dir: models_dir.to_path_buf(),
            model_type_override: config.model_type,
            model: None,
        }
    }

    /// Run inference on prepared samples (f32, mono, 16kHz)
    fn run(&mut self, samples: Vec<f32>) -> Result<String, TranscribeError> {
        let model = self.model.as_mut().ok_or(TranscribeError::NotLoaded)?;

        let start = std::time::Instant::now();

        let result = match model {
            ParakeetModel::Ctc(parakeet) => parakeet
                .transcribe_samples(
                    samples, 16000, // sample rate
                    1,     // mono
                    None,  // default timestamp mode
                )
                .map_err(|e| {
                    TranscribeError::TranscriptionFailed(format!(
                        "Parakeet CTC inference failed: {}",
                        e
                    ))
                })?,
            ParakeetModel::Tdt(parakeet) => parakeet
                .transcribe_samples(
                    samples, 16000, // sample rate
                    1,     // mono
                    None,  // default timestamp mode
                )
                .map_err(|e| {
                    TranscribeError::TranscriptionFailed(format!(
                        "Parakeet TDT inference failed: {}",
                        e
                    ))
                })?,
        };

        let text = result.text.trim().to_string();

        tracing::info!(
            "Parakeet transcription completed in {:.2}s ({} chars)",
            start.elapsed().as_secs_f32(),
            text.chars().count()
        );

        Ok(text)
    }
}

impl Backend for ParakeetBackend {
    fn load(&mut self) -> Result<(), TranscribeError> {
        if self.model.is_some() {
            tracing::debug!("Parakeet model already loaded");
            return Ok(());
        }

        let model_path = resolve_model_path(&self.identifier, &self.models_dir)?;
        let model_type = self
            .model_type_override
            .unwrap_or_else(|| detect_model_type(&model_path));

        tracing::info!(
            "Loading Parakeet {:?} model from {:?}",
            model_type,
            model_path
        );
        let start = std::time::Instant::now();

        let exec_config = build_execution_config();

        let model = match model_type {
            ParakeetModelType::Ctc => {
                let parakeet = Parakeet::from_pretrained(&model_path, exec_config)
                    .map_err(|e| {
                        TranscribeError::LoadFailed(format!("Parakeet CTC init failed: {}", e))
                    })?;
                ParakeetModel::Ctc(parakeet)
            }
            ParakeetModelType::Tdt => {
                let parakeet = ParakeetTDT::from_pretrained(&model_path, exec_config)
                    .map_err(|e| {
                        TranscribeError::LoadFailed(format!("Parakeet TDT init failed: {}", e))
                    })?;
                ParakeetModel::Tdt(parakeet)
            }
        };

        tracing::info!(
            "Parakeet {:?} model loaded in {:.2}s",
            model_type,
            start.elapsed().as_secs_f32()
        );

        self.model = Some(model);
        Ok(())
    }

    fn unload(&mut self) {
        if self.model.take().is_some() {
            tracing::info!("Parakeet model unloaded");
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
        self.run(prepared)
    }

    fn transcribe_encoded(&mut self, bytes: &[u8]) -> Result<String, TranscribeError> {
        if bytes.is_empty() {
            return Ok(String::new());
        }

        if self.model.is_none() {
            self.load()?;
        }

        let (samples, sample_rate, channels) = audio::decode_wav(bytes)?;
        let prepared = audio::prepare(&samples, sample_rate, channels)?;
        self.run(prepared)
    }

    fn device_description(&self) -> &'static str {
        if cfg!(feature = "parakeet-cuda") {
            "GPU (CUDA)"
        } else if cfg!(feature = "parakeet-tensorrt") {
            "GPU (TensorRT)"
        } else if cfg!(feature = "parakeet-rocm") {
            "GPU (ROCm)"
        } else if cfg!(feature = "parakeet-coreml") {
            "GPU (CoreML)"
        } else {
            "CPU"
        }
    }

    fn is_loaded(&self) -> bool {
        self.model.is_some()
    }
}

/// Build execution config based on compile-time feature flags
fn build_execution_config() -> Option<ExecutionConfig> {
    #[cfg(feature = "parakeet-cuda")]
    {
        if probe_cuda_runtime() {
            tracing::info!("Configuring CUDA execution provider for NVIDIA GPU acceleration");
            return Some(ExecutionConfig::new().with_execution_provider(ExecutionProvider::Cuda));
        }
        tracing::warn!("CUDA not available or incompatible, falling back to CPU inference");
        return None;
    }

    #[cfg(feature = "parakeet-tensorrt")]
    {
        if probe_cuda_runtime() {
            tracing::info!("Configuring TensorRT execution provider for NVIDIA GPU acceleration");
            return Some(
                ExecutionConfig::new().with_execution_provider(ExecutionProvider::TensorRT),
            );
        }
        tracing::warn!("CUDA not available or incompatible, falling back to CPU inference");
        return None;
    }

    #[cfg(feature = "parakeet-rocm")]
    {
        tracing::info!("Configuring ROCm execution provider for AMD GPU acceleration");
        return Some(ExecutionConfig::new().with_execution_provider(ExecutionProvider::ROCm));
    }

    #[cfg(not(any(
        feature = "parakeet-cuda",
        feature = "parakeet-tensorrt",
        feature = "parakeet-rocm"
    )))]
    {
        None
    }
}

/// Probe CUDA runtime availability and version compatibility.
///
/// The bundled ONNX Runtime (from the `ort` crate) is built against CUDA 12.x.
/// A different major version segfaults during EP initialization instead of
/// returning an error, so the version is checked before opting in.
#[cfg(any(feature = "parakeet-cuda", feature = "parakeet-tensorrt"))]
fn probe_cuda_runtime() -> bool {
    let lib_names: &[&[u8]] = &[
        b"libcudart.so\0",
        b"libcudart.so.12\0",
        b"libcudart.so.13\0",
    ];

    let mut handle = std::ptr::null_mut();
    for name in lib_names {
        handle = unsafe { libc::dlopen(name.as_ptr() as *const libc::c_char, libc::RTLD_LAZY) };
        if !handle.is_null() {
            break;
        }
    }

    if handle.is_null() {
        tracing::error!(
            "CUDA runtime library (libcudart.so) not found. \
             Cannot initialize CUDA execution provider."
        );
        return false;
    }

    let sym = unsafe {
        libc::dlsym(
            handle,
            b"cudaRuntimeGetVersion\0".as_ptr() as *const libc::c_char,
        )
    };

    if sym.is_null() {
        tracing::warn!("Could not find cudaRuntimeGetVersion in CUDA runtime library");
        unsafe { libc::dlclose(handle) };
        // Can't determine version, proceed and hope for the best
        return true;
    }

    // cudaRuntimeGetVersion signature: cudaError_t cudaRuntimeGetVersion(int *runtimeVersion)
    // Version is encoded as (major * 1000 + minor * 10)
    type CudaRuntimeGetVersion = unsafe extern "C" fn(*mut i32) -> i32;
    let get_version: CudaRuntimeGetVersion = unsafe { std::mem::transmute(sym) };

    let mut version: i32 = 0;
    let result = unsafe { get_version(&mut version) };
    unsafe { libc::dlclose(handle) };

    if result != 0 {
        tracing::warn!("cudaRuntimeGetVersion failed (error code {})", result);
        return true;
    }

    let major = version / 1000;
    let minor = (version % 1000) / 10;
    tracing::info!("Detected CUDA runtime version: {}.{}", major, minor);

    const EXPECTED_CUDA_MAJOR: i32 = 12;

    if major != EXPECTED_CUDA_MAJOR {
        tracing::error!(
            "CUDA version mismatch: found CUDA {}.{}, but the bundled ONNX Runtime \
             requires CUDA {}.x. Continuing would crash the process.",
            major,
            minor,
            EXPECTED_CUDA_MAJOR,
        );
        return false;
    }

    true
}

/// Auto-detect model type from directory structure
///
/// TDT models have: encoder-model.onnx, decoder_joint-model.onnx, vocab.txt
/// CTC models have: model.onnx (or model_int8.onnx), tokenizer.json
fn detect_model_type(path: &Path) -> ParakeetModelType {
    let has_encoder =
        path.join("encoder-model.onnx").exists() || path.join("encoder-model.onnx.data").exists();
    let has_decoder = path.join("decoder_joint-model.onnx").exists();

    if has_encoder && has_decoder {
        tracing::debug!("Auto-detected TDT model (found encoder + decoder ONNX files)");
        return ParakeetModelType::Tdt;
    }

    let has_ctc_model = path.join("model.onnx").exists() || path.join("model_int8.onnx").exists();
    let has_tokenizer = path.join("tokenizer.json").exists();

    if has_ctc_model && has_tokenizer {
        tracing::debug!("Auto-detected CTC model (found model.onnx + tokenizer.json)");
        return ParakeetModelType::Ctc;
    }

    tracing::warn!(
        "Could not auto-detect model type from {:?}, defaulting to TDT. \
        Set model_type in config to override.",
        path
    );
    ParakeetModelType::Tdt
}

/// Resolve a model identifier to a model directory path
///
/// Accepts an absolute path, a directory name under the models dir, or a
/// hub-style identifier ("mlx-community/parakeet-tdt-0.6b-v3") whose last
/// segment names the directory.
fn resolve_model_path(identifier: &str, models_dir: &Path) -> Result<PathBuf, TranscribeError> {
    let path = PathBuf::from(identifier);
    if path.is_absolute() && path.exists() {
        return Ok(path);
    }

    let model_path = models_dir.join(identifier);
    if model_path.exists() {
        return Ok(model_path);
    }

    // Hub-style identifiers keep only the final segment on disk
    let short_name = identifier.rsplit('/').next().unwrap_or(identifier);
    let short_path = models_dir.join(short_name);
    if short_path.exists() {
        return Ok(short_path);
    }

    Err(TranscribeError::ModelNotFound(format!(
        "Parakeet model '{}' not found. Looked in:\n  - {}\n  - {}\n\n\
        Download TDT (recommended): https://huggingface.co/istupakov/parakeet-tdt-0.6b-v3-onnx",
        identifier,
        model_path.display(),
        short_path.display()
    )))
}
