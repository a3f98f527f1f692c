//! Daemon module - the command loop
//!
//! Reads one JSON line at a time from stdin, fully processes it, writes
//! exactly one response line to stdout, then reads the next. There is
//! never more than one command in flight, so responses come back in
//! request order and the model manager needs no synchronization.
//!
//! The loop terminates on the `exit` command (after responding), on
//! end-of-input (no response), or on SIGINT/SIGTERM. Every exit path
//! runs the manager's cleanup; the signal handlers stay installed, so a
//! second termination signal arriving during teardown is absorbed
//! instead of killing the process mid-release.

use crate::config::Config;
use crate::error::Result;
use crate::manager::ModelManager;
use crate::protocol::{self, Command, Response};
use crate::registry::Registry;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};

/// What the loop should do after handling one line
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// Write the response and keep reading
    Respond(Response),
    /// Write the response, then terminate the loop
    Exit(Response),
}

/// Process one request line against the manager
///
/// Never fails: every parse error, manager error, and backend failure is
/// already a well-formed error response by the time it leaves here. One
/// line in, one response out.
pub fn handle_line(manager: &mut ModelManager, line: &str) -> LineOutcome {
    let command = match protocol::parse_command(line) {
        Ok(command) => command,
        Err(e) => return LineOutcome::Respond(Response::error(e.to_string())),
    };

    match command {
        Command::Ping => LineOutcome::Respond(Response::success("pong")),

        Command::Exit => LineOutcome::Exit(Response::success("Exiting daemon")),

        Command::LoadModel { model } => respond(manager.load_model(&model)),

        Command::UnloadModel => {
            LineOutcome::Respond(Response::success(manager.unload_model().to_string()))
        }

        Command::TranscribeRaw {
            audio,
            sample_rate,
            channels,
        } => respond(manager.transcribe_raw(&audio, sample_rate, channels)),

        Command::TranscribeEncoded { audio } => respond(manager.transcribe_encoded(&audio)),

        Command::Status => LineOutcome::Respond(Response::success(manager.status())),
    }
}

fn respond(result: std::result::Result<String, crate::error::TranscribeError>) -> LineOutcome {
    match result {
        Ok(message) => LineOutcome::Respond(Response::success(message)),
        Err(e) => LineOutcome::Respond(Response::error(e.to_string())),
    }
}

/// The voxd daemon: command loop plus the model manager it drives
pub struct Daemon {
    manager: ModelManager,
}

impl Daemon {
    /// Create a daemon wired to the config-driven backend registry
    pub fn new(config: Config) -> Self {
        let registry = Registry::from_config(&config);
        Self {
            manager: ModelManager::new(Box::new(registry)),
        }
    }

    /// Run the command loop until exit, end-of-input, or a signal
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting voxd daemon");

        let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
            crate::error::VoxdError::Config(format!("Failed to set up SIGTERM handler: {}", e))
        })?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            match handle_line(&mut self.manager, &line) {
                                LineOutcome::Respond(response) => {
                                    write_response(&mut stdout, &response).await?;
                                }
                                LineOutcome::Exit(response) => {
                                    write_response(&mut stdout, &response).await?;
                                    tracing::info!("Received exit command, shutting down...");
                                    break;
                                }
                            }
                        }
                        Ok(None) => {
                            tracing::info!("Input stream closed, shutting down...");
                            break;
                        }
                        Err(e) => {
                            tracing::error!("Failed to read from stdin: {}", e);
                            break;
                        }
                    }
                }

                // Graceful shutdown (SIGINT from Ctrl+C)
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT, shutting down...");
                    break;
                }

                // Graceful shutdown (SIGTERM from a supervisor)
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    break;
                }
            }
        }

        // Best-effort teardown on every exit path; cannot fail or hang
        let outcome = self.manager.cleanup();
        tracing::info!("{}", outcome);
        tracing::info!("Daemon stopped");

        Ok(())
    }
}

/// Write a single response line and flush it
async fn write_response(
    stdout: &mut tokio::io::Stdout,
    response: &Response,
) -> std::io::Result<()> {
    if let Ok(json) = serde_json::to_string(response) {
        stdout.write_all(json.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscribeError;
    use crate::registry::BackendFactory;
    use crate::transcribe::Backend;

    struct NoBackendFactory;

    impl BackendFactory for NoBackendFactory {
        fn create(
            &self,
            identifier: &str,
        ) -> std::result::Result<Box<dyn Backend>, TranscribeError> {
            Err(TranscribeError::UnsupportedModel {
                requested: identifier.to_string(),
                known: "whisper, parakeet, canary".to_string(),
            })
        }
    }

    fn empty_manager() -> ModelManager {
        ModelManager::new(Box::new(NoBackendFactory))
    }

    fn message_of(outcome: LineOutcome) -> Response {
        match outcome {
            LineOutcome::Respond(r) | LineOutcome::Exit(r) => r,
        }
    }

    #[test]
    fn ping_always_pongs() {
        let mut manager = empty_manager();
        let outcome = handle_line(&mut manager, r#"{"action":"ping"}"#);
        assert_eq!(
            outcome,
            LineOutcome::Respond(Response::success("pong"))
        );
    }

    #[test]
    fn exit_responds_then_terminates() {
        let mut manager = empty_manager();
        let outcome = handle_line(&mut manager, r#"{"action":"exit"}"#);
        assert_eq!(outcome, LineOutcome::Exit(Response::success("Exiting daemon")));
    }

    #[test]
    fn malformed_json_yields_error_response_not_termination() {
        let mut manager = empty_manager();
        let outcome = handle_line(&mut manager, "{oops");
        let response = message_of(outcome);
        assert!(response.message.starts_with("Invalid JSON: "));

        // The loop is still usable afterwards
        let outcome = handle_line(&mut manager, r#"{"action":"ping"}"#);
        assert_eq!(outcome, LineOutcome::Respond(Response::success("pong")));
    }

    #[test]
    fn unknown_action_is_named() {
        let mut manager = empty_manager();
        let response = message_of(handle_line(&mut manager, r#"{"action":"warp"}"#));
        assert_eq!(response.message, "Unknown action: warp");
    }

    #[test]
    fn load_failure_becomes_error_response() {
        let mut manager = empty_manager();
        let response = message_of(handle_line(
            &mut manager,
            r#"{"action":"load_model","model":"unknown-vendor/foo"}"#,
        ));
        assert_eq!(response.status, crate::protocol::Status::Error);
        assert!(response.message.contains("unknown-vendor/foo"));
    }

    #[test]
    fn transcribe_without_model_reports_not_loaded() {
        let mut manager = empty_manager();
        let response = message_of(handle_line(
            &mut manager,
            r#"{"action":"transcribe_raw","audio":""}"#,
        ));
        assert_eq!(response.message, "No model loaded");
    }

    #[test]
    fn unload_twice_distinguishes_the_noop() {
        let mut manager = empty_manager();
        let response = message_of(handle_line(&mut manager, r#"{"action":"unload_model"}"#));
        assert_eq!(response.message, "No model to unload");
    }

    #[test]
    fn status_with_empty_manager() {
        let mut manager = empty_manager();
        let response = message_of(handle_line(&mut manager, r#"{"action":"status"}"#));
        assert_eq!(response, Response::success("No model loaded"));
    }
}
