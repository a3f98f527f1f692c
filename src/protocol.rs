//! Wire protocol for the voxd daemon
//!
//! One JSON object per line in each direction, UTF-8, newline-terminated.
//! Requests carry an `action` field; binary audio payloads are base64.
//! Responses always use the `{"status": ..., "message": ...}` envelope —
//! transcripts and load confirmations travel in `message`, never as bare
//! strings, so callers can parse every line the same way.
//!
//! Parsing is strict where it matters and lenient where it doesn't:
//! unknown top-level fields are ignored, but a missing `action` or a
//! missing required field for a known action is a protocol error.

use crate::error::ProtocolError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Default sample rate for `transcribe_raw` when the request omits it.
/// Matches the capture pipeline that feeds the daemon.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Default channel count for `transcribe_raw` when the request omits it.
pub const DEFAULT_CHANNELS: u16 = 1;

/// A validated command parsed from one request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Construct and load the backend for the given model identifier
    LoadModel { model: String },
    /// Release the active backend, if any
    UnloadModel,
    /// Transcribe raw little-endian signed 16-bit PCM
    TranscribeRaw {
        audio: Vec<u8>,
        sample_rate: u32,
        channels: u16,
    },
    /// Transcribe a self-describing encoded audio blob (e.g. WAV)
    TranscribeEncoded { audio: Vec<u8> },
    /// Report the active model and its compute placement
    Status,
    /// Liveness check
    Ping,
    /// Respond, then terminate the read loop
    Exit,
}

/// Raw request envelope, before validation
///
/// Every field is optional at this stage; serde ignores unknown fields by
/// default, which is exactly the leniency the protocol wants.
#[derive(Debug, Deserialize)]
struct Envelope {
    action: Option<String>,
    model: Option<String>,
    audio: Option<String>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
}

/// Parse and validate one request line into a [`Command`]
pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(line.trim())
        .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

    let action = envelope.action.ok_or(ProtocolError::MissingAction)?;

    match action.as_str() {
        "load_model" => {
            let model = envelope.model.ok_or(ProtocolError::MissingField {
                action: "load_model",
                field: "model",
            })?;
            Ok(Command::LoadModel { model })
        }
        "unload_model" => Ok(Command::UnloadModel),
        "transcribe_raw" => {
            let audio = decode_audio(envelope.audio, "transcribe_raw")?;
            Ok(Command::TranscribeRaw {
                audio,
                sample_rate: envelope.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
                channels: envelope.channels.unwrap_or(DEFAULT_CHANNELS),
            })
        }
        "transcribe" => {
            let audio = decode_audio(envelope.audio, "transcribe")?;
            Ok(Command::TranscribeEncoded { audio })
        }
        "status" => Ok(Command::Status),
        "ping" => Ok(Command::Ping),
        "exit" => Ok(Command::Exit),
        other => Err(ProtocolError::UnknownAction(other.to_string())),
    }
}

fn decode_audio(
    audio: Option<String>,
    action: &'static str,
) -> Result<Vec<u8>, ProtocolError> {
    let encoded = audio.ok_or(ProtocolError::MissingField {
        action,
        field: "audio",
    })?;
    BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| ProtocolError::InvalidPayload {
            field: "audio",
            detail: e.to_string(),
        })
}

/// Response status discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// One response line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub message: String,
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Response {
            status: Status::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response {
            status: Status::Error,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ping() {
        assert_eq!(parse_command(r#"{"action":"ping"}"#).unwrap(), Command::Ping);
    }

    #[test]
    fn parse_exit() {
        assert_eq!(parse_command(r#"{"action":"exit"}"#).unwrap(), Command::Exit);
    }

    #[test]
    fn parse_load_model() {
        let cmd = parse_command(r#"{"action":"load_model","model":"parakeet-tdt-0.6b-v3"}"#)
            .unwrap();
        assert_eq!(
            cmd,
            Command::LoadModel {
                model: "parakeet-tdt-0.6b-v3".to_string()
            }
        );
    }

    #[test]
    fn load_model_without_model_is_an_error() {
        let err = parse_command(r#"{"action":"load_model"}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MissingField {
                action: "load_model",
                field: "model"
            }
        ));
    }

    #[test]
    fn unknown_action_names_the_action() {
        let err = parse_command(r#"{"action":"reticulate"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unknown action: reticulate");
    }

    #[test]
    fn missing_action_is_an_error() {
        let err = parse_command(r#"{"model":"whisper-base.en"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingAction));
    }

    #[test]
    fn malformed_json_reports_parser_detail() {
        let err = parse_command("{not json").unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid JSON: "), "got: {msg}");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let cmd = parse_command(r#"{"action":"ping","extra":42,"nested":{"a":1}}"#).unwrap();
        assert_eq!(cmd, Command::Ping);
    }

    #[test]
    fn transcribe_raw_defaults_and_base64() {
        let audio = BASE64.encode([0u8, 1, 2, 3]);
        let line = format!(r#"{{"action":"transcribe_raw","audio":"{audio}"}}"#);
        let cmd = parse_command(&line).unwrap();
        assert_eq!(
            cmd,
            Command::TranscribeRaw {
                audio: vec![0, 1, 2, 3],
                sample_rate: DEFAULT_SAMPLE_RATE,
                channels: DEFAULT_CHANNELS,
            }
        );
    }

    #[test]
    fn transcribe_raw_honors_explicit_format() {
        let audio = BASE64.encode([0u8; 4]);
        let line = format!(
            r#"{{"action":"transcribe_raw","audio":"{audio}","sample_rate":16000,"channels":2}}"#
        );
        match parse_command(&line).unwrap() {
            Command::TranscribeRaw {
                sample_rate,
                channels,
                ..
            } => {
                assert_eq!(sample_rate, 16000);
                assert_eq!(channels, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn transcribe_rejects_bad_base64() {
        let err =
            parse_command(r#"{"action":"transcribe","audio":"not!!base64"}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidPayload { field: "audio", .. }
        ));
    }

    #[test]
    fn response_envelope_serialization() {
        let resp = Response::success("pong");
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"status":"success","message":"pong"}"#
        );

        let resp = Response::error("Unknown action: nope");
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"status":"error","message":"Unknown action: nope"}"#
        );
    }
}
