//! Backend registry: maps model identifiers to concrete backends
//!
//! The recognized families come from configuration, not code: each
//! `[[models.family]]` entry carries its match patterns and the engine
//! serving it. Matching is case-insensitive substring, first family in
//! config order wins, and nothing but the identifier affects the result.
//!
//! Construction is cheap — the returned backend has not loaded anything
//! yet. The only construction-time failures are capability gates: a
//! family marked `unimplemented`, or one whose engine is compiled out of
//! this build, fails fast instead of pretending the model might load.

use crate::config::{Config, Engine, FamilyConfig, ParakeetConfig, WhisperConfig};
use crate::error::TranscribeError;
use crate::transcribe::whisper::WhisperBackend;
use crate::transcribe::Backend;
use std::path::PathBuf;

#[cfg(feature = "parakeet")]
use crate::transcribe::parakeet::ParakeetBackend;

/// Factory seam between the model manager and concrete backends
///
/// The daemon wires in [`Registry`]; tests substitute stub factories to
/// inject backend failures.
pub trait BackendFactory: Send {
    /// Construct a new, not-yet-loaded backend for the identifier
    fn create(&self, identifier: &str) -> Result<Box<dyn Backend>, TranscribeError>;
}

/// Config-driven backend registry
pub struct Registry {
    families: Vec<FamilyConfig>,
    whisper: WhisperConfig,
    #[cfg_attr(not(feature = "parakeet"), allow(dead_code))]
    parakeet: ParakeetConfig,
    models_dir: PathBuf,
}

impl Registry {
    /// Build a registry from the effective configuration
    pub fn from_config(config: &Config) -> Self {
        Registry {
            families: config.models.family.clone(),
            whisper: config.whisper.clone(),
            parakeet: config.parakeet.clone(),
            models_dir: config.models_dir(),
        }
    }

    /// Names of all recognized families, in match order
    pub fn known_families(&self) -> Vec<&str> {
        self.families.iter().map(|f| f.name.as_str()).collect()
    }

    /// Find the first family whose patterns match the identifier
    fn resolve(&self, identifier: &str) -> Option<&FamilyConfig> {
        let needle = identifier.to_lowercase();
        self.families.iter().find(|family| {
            family
                .patterns
                .iter()
                .any(|p| needle.contains(&p.to_lowercase()))
        })
    }
}

impl BackendFactory for Registry {
    fn create(&self, identifier: &str) -> Result<Box<dyn Backend>, TranscribeError> {
        let family = self
            .resolve(identifier)
            .ok_or_else(|| TranscribeError::UnsupportedModel {
                requested: identifier.to_string(),
                known: self.known_families().join(", "),
            })?;

        tracing::debug!(
            "Identifier '{}' matched family '{}' ({:?})",
            identifier,
            family.name,
            family.engine
        );

        match family.engine {
            Engine::Whisper => Ok(Box::new(WhisperBackend::new(
                identifier,
                &self.whisper,
                &self.models_dir,
            ))),

            #[cfg(feature = "parakeet")]
            Engine::Parakeet => Ok(Box::new(ParakeetBackend::new(
                identifier,
                &self.parakeet,
                &self.models_dir,
            ))),

            #[cfg(not(feature = "parakeet"))]
            Engine::Parakeet => Err(TranscribeError::FamilyUnavailable {
                family: family.name.clone(),
                reason: "this build does not include the parakeet engine \
                         (rebuild with --features parakeet)"
                    .to_string(),
            }),

            Engine::Unimplemented => Err(TranscribeError::FamilyUnavailable {
                family: family.name.clone(),
                reason: "recognized but not implemented in this build".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelsConfig;

    fn test_registry() -> Registry {
        Registry::from_config(&Config::default())
    }

    #[test]
    fn unknown_identifier_is_unsupported_and_lists_families() {
        let registry = test_registry();
        let err = registry.create("unknown-vendor/foo").unwrap_err();

        match err {
            TranscribeError::UnsupportedModel { requested, known } => {
                assert_eq!(requested, "unknown-vendor/foo");
                assert!(known.contains("whisper"));
                assert!(known.contains("parakeet"));
                assert!(known.contains("canary"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn matching_is_case_insensitive() {
        let registry = test_registry();
        assert!(registry.resolve("WHISPER-Base.EN").is_some());
        assert!(registry.resolve("Nvidia/CANARY-1b").is_some());
    }

    #[test]
    fn matching_is_substring_anywhere() {
        let registry = test_registry();
        let family = registry.resolve("mlx-community/parakeet-tdt-0.6b-v3").unwrap();
        assert_eq!(family.name, "parakeet");
    }

    #[test]
    fn first_family_in_config_order_wins() {
        let mut config = Config::default();
        config.models = ModelsConfig {
            dir: None,
            default: "whisper-base.en".to_string(),
            family: vec![
                FamilyConfig {
                    name: "first".to_string(),
                    patterns: vec!["model".to_string()],
                    engine: Engine::Unimplemented,
                },
                FamilyConfig {
                    name: "second".to_string(),
                    patterns: vec!["model".to_string()],
                    engine: Engine::Whisper,
                },
            ],
        };

        let registry = Registry::from_config(&config);
        assert_eq!(registry.resolve("some-model").unwrap().name, "first");
    }

    #[test]
    fn unimplemented_family_fails_fast_with_capability_error() {
        let registry = test_registry();
        let err = registry.create("nvidia/canary-1b-v2").unwrap_err();

        match err {
            TranscribeError::FamilyUnavailable { family, .. } => {
                assert_eq!(family, "canary");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn whisper_identifier_constructs_an_unloaded_backend() {
        let registry = test_registry();
        let backend = registry.create("whisper-base.en").unwrap();
        assert!(!backend.is_loaded());
    }

    #[cfg(not(feature = "parakeet"))]
    #[test]
    fn parakeet_without_feature_fails_fast() {
        let registry = test_registry();
        let err = registry.create("parakeet-tdt-0.6b-v3").unwrap_err();
        assert!(matches!(
            err,
            TranscribeError::FamilyUnavailable { .. }
        ));
    }

    #[cfg(feature = "parakeet")]
    #[test]
    fn parakeet_identifier_constructs_an_unloaded_backend() {
        let registry = test_registry();
        let backend = registry.create("parakeet-tdt-0.6b-v3").unwrap();
        assert!(!backend.is_loaded());
    }

    #[test]
    fn empty_family_list_rejects_everything() {
        let mut config = Config::default();
        config.models.family.clear();
        let registry = Registry::from_config(&config);
        assert!(registry.create("whisper-base.en").is_err());
    }
}
