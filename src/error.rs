//! Error types for voxd
//!
//! Uses thiserror for ergonomic error definitions. Protocol errors are
//! recovered inside the command loop; transcription errors are converted
//! to error responses at the manager boundary. Nothing here terminates
//! the daemon.

use thiserror::Error;

/// Top-level error type for the voxd application
#[derive(Error, Debug)]
pub enum VoxdError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors arising from a single request line
///
/// Always recovered locally: the loop emits one error response and keeps
/// reading.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing 'action' field")]
    MissingAction,

    #[error("'{action}' requires a '{field}' field")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("Invalid '{field}' payload: {detail}")]
    InvalidPayload {
        field: &'static str,
        detail: String,
    },
}

/// Errors related to model lifecycle and speech-to-text transcription
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Unsupported model: '{requested}'. Known families: {known}")]
    UnsupportedModel { requested: String, known: String },

    #[error("Model family '{family}' is not available: {reason}")]
    FamilyUnavailable { family: String, reason: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model loading failed: {0}")]
    LoadFailed(String),

    #[error("No model loaded")]
    NotLoaded,

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),
}

/// Result type alias using VoxdError
pub type Result<T> = std::result::Result<T, VoxdError>;
