//! Configuration loading and types for voxd
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/voxd/config.toml)
//! 3. Environment variables (VOXD_*)
//! 4. CLI arguments (highest priority)
//!
//! The recognized model families — and whether each one has an engine in
//! this build — are configuration, not code: `[[models.family]]` entries
//! are matched in order against requested identifiers.

use crate::error::VoxdError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Voxd Configuration
#
# Location: ~/.config/voxd/config.toml
# All settings can be overridden via CLI flags

[models]
# Directory holding model files (default: ~/.local/share/voxd/models)
# dir = "/path/to/models"

# Model loaded by `voxd transcribe` when no --model is given
default = "whisper-base.en"

# Recognized model families, matched in order against requested
# identifiers (case-insensitive substring, first match wins).
# engine is one of: "whisper", "parakeet", "unimplemented"
[[models.family]]
name = "whisper"
patterns = ["whisper", "ggml"]
engine = "whisper"

[[models.family]]
name = "parakeet"
patterns = ["parakeet"]
engine = "parakeet"

[[models.family]]
name = "canary"
patterns = ["canary"]
engine = "unimplemented"

[whisper]
# Language for transcription ("auto" for auto-detection)
language = "en"

# Translate non-English speech to English
translate = false

# Number of CPU threads for inference (omit for auto-detection)
# threads = 4

[parakeet]
# Model architecture: "ctc" or "tdt" (omit for auto-detection from the
# model directory)
# model_type = "tdt"
"#;

/// Which transcription engine serves a model family
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Whisper,
    Parakeet,
    /// Recognized family with no engine in this build; requests for it
    /// fail fast with a capability error instead of "unknown model".
    Unimplemented,
}

/// One recognized model family
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FamilyConfig {
    /// Family name, used in error messages ("whisper", "canary", ...)
    pub name: String,

    /// Substring patterns matched case-insensitively against identifiers
    pub patterns: Vec<String>,

    /// Engine serving this family
    pub engine: Engine,
}

/// Model resolution configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    /// Directory holding model files; defaults to the data dir
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Model identifier used by one-shot transcription when no --model
    /// override is given
    #[serde(default = "default_model")]
    pub default: String,

    /// Ordered family match list
    #[serde(default = "default_families")]
    pub family: Vec<FamilyConfig>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        ModelsConfig {
            dir: None,
            default: default_model(),
            family: default_families(),
        }
    }
}

/// Parakeet model architecture
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParakeetModelType {
    /// CTC model (character-level, faster)
    Ctc,
    /// TDT model (token-level, better quality output)
    Tdt,
}

/// Whisper engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhisperConfig {
    /// Language for transcription ("auto" enables auto-detection)
    #[serde(default = "default_language")]
    pub language: String,

    /// Translate non-English speech to English
    #[serde(default)]
    pub translate: bool,

    /// Number of CPU threads for inference (omit for auto-detection)
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        WhisperConfig {
            language: default_language(),
            translate: false,
            threads: None,
        }
    }
}

/// Parakeet engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ParakeetConfig {
    /// Model architecture override; auto-detected from the model
    /// directory when omitted
    #[serde(default)]
    pub model_type: Option<ParakeetModelType>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub whisper: WhisperConfig,

    #[serde(default)]
    pub parakeet: ParakeetConfig,
}

fn default_model() -> String {
    "whisper-base.en".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_families() -> Vec<FamilyConfig> {
    vec![
        FamilyConfig {
            name: "whisper".to_string(),
            patterns: vec!["whisper".to_string(), "ggml".to_string()],
            engine: Engine::Whisper,
        },
        FamilyConfig {
            name: "parakeet".to_string(),
            patterns: vec!["parakeet".to_string()],
            engine: Engine::Parakeet,
        },
        FamilyConfig {
            name: "canary".to_string(),
            patterns: vec!["canary".to_string()],
            engine: Engine::Unimplemented,
        },
    ]
}

impl Config {
    /// Default config file path: ~/.config/voxd/config.toml
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("voxd").join("config.toml"))
    }

    /// Data directory: ~/.local/share/voxd
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("voxd"))
            .unwrap_or_else(|| PathBuf::from(".voxd"))
    }

    /// Directory holding model files, honoring the config override
    pub fn models_dir(&self) -> PathBuf {
        self.models
            .dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("models"))
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, VoxdError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| VoxdError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| VoxdError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(dir) = std::env::var("VOXD_MODELS_DIR") {
        config.models.dir = Some(PathBuf::from(dir));
    }
    if let Ok(model) = std::env::var("VOXD_MODEL") {
        config.models.default = model;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.models.default, "whisper-base.en");
        assert_eq!(config.models.family.len(), 3);
        assert_eq!(config.models.family[0].engine, Engine::Whisper);
        assert_eq!(config.models.family[2].engine, Engine::Unimplemented);
    }

    #[test]
    fn test_default_families_cover_known_engines() {
        let families = default_families();
        assert!(families.iter().any(|f| f.engine == Engine::Whisper));
        assert!(families.iter().any(|f| f.engine == Engine::Parakeet));
    }

    #[test]
    fn test_parse_custom_family_list() {
        let toml_str = r#"
            [models]
            default = "canary-1b-v2"

            [[models.family]]
            name = "canary"
            patterns = ["canary", "nvidia/canary"]
            engine = "whisper"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.models.family.len(), 1);
        assert_eq!(config.models.family[0].engine, Engine::Whisper);
        assert_eq!(config.models.family[0].patterns.len(), 2);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.whisper.language, "en");
        assert!(!config.whisper.translate);
        assert!(config.whisper.threads.is_none());
        assert_eq!(config.models.family.len(), 3);
    }

    #[test]
    fn test_models_dir_override() {
        let config: Config = toml::from_str(
            r#"
            [models]
            dir = "/opt/voxd/models"
            "#,
        )
        .unwrap();
        assert_eq!(config.models_dir(), PathBuf::from("/opt/voxd/models"));
    }
}
