//! Voxd: speech-to-text model daemon
//!
//! This library provides the core functionality for:
//! - Speaking a line-delimited JSON command protocol over stdin/stdout
//! - Managing the lifecycle of one speech-to-text model at a time
//! - Resolving opaque model identifiers to concrete backends via a
//!   config-driven family registry
//! - Transcribing raw PCM or encoded WAV audio through whichever backend
//!   is active (whisper.cpp, or Parakeet with the `parakeet` feature)
//!
//! # Architecture
//!
//! ```text
//!   stdin ──▶ ┌──────────────┐     ┌───────────────┐     ┌───────────────┐
//!             │ Command Loop │ ──▶ │ Model Manager │ ──▶ │   Registry    │
//!   stdout ◀─ │  (daemon)    │     │ (one active   │     │ (identifier → │
//!             └──────────────┘     │    backend)   │     │    backend)   │
//!                                  └───────┬───────┘     └───────────────┘
//!                                          │
//!                                          ▼
//!                                  ┌───────────────┐
//!                                  │    Backend    │
//!                                  │ whisper-rs /  │
//!                                  │ parakeet-rs   │
//!                                  └───────────────┘
//! ```
//!
//! One command is processed at a time: the loop reads a line, blocks
//! through any model load or inference it implies, writes the response,
//! and only then reads the next line. The manager exclusively owns the
//! active backend, so the single-task discipline is the whole
//! concurrency story.

pub mod audio;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod transcribe;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Result, VoxdError};
