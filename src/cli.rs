// Command-line interface definitions for voxd
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "voxd")]
#[command(author, version, about = "Speech-to-text model daemon")]
#[command(long_about = "
Voxd manages one speech-to-text model at a time and exposes it over a
line-delimited JSON protocol on stdin/stdout.

PROTOCOL:
  Each request is one JSON object per line with an \"action\" field:
  load_model, unload_model, transcribe_raw, transcribe, status, ping, exit.
  Each response is one line: {\"status\": \"success\"|\"error\", \"message\": ...}

USAGE:
  Run `voxd` (or `voxd daemon`) from a supervising process and speak the
  protocol over its pipes, or use `voxd transcribe <file>` for one-shot
  transcription of a WAV file.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override the default model identifier
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Override the models directory
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Transcribe an audio file (WAV) and print the transcript
    Transcribe {
        /// Path to audio file
        file: std::path::PathBuf,
    },

    /// Show current configuration
    Config,
}
