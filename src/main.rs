//! Voxd - speech-to-text model daemon
//!
//! Run with `voxd` or `voxd daemon` to start the daemon and speak the
//! JSON line protocol over stdin/stdout.
//! Use `voxd transcribe <file>` to transcribe an audio file once.
//! Use `voxd config` to print the effective configuration.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use voxd::daemon::Daemon;
use voxd::manager::ModelManager;
use voxd::registry::Registry;
use voxd::{config, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging. Diagnostics go to stderr: stdout is reserved
    // for protocol responses.
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("voxd={},warn", log_level))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(model) = cli.model {
        config.models.default = model;
    }
    if let Some(dir) = cli.models_dir {
        config.models.dir = Some(dir);
    }

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }

        Commands::Transcribe { file } => {
            transcribe_file(&config, &file)?;
        }

        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

/// One-shot transcription of an audio file through the same manager path
/// the daemon uses
fn transcribe_file(config: &config::Config, path: &std::path::Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path)?;

    let registry = Registry::from_config(config);
    let mut manager = ModelManager::new(Box::new(registry));

    manager.load_model(&config.models.default)?;
    let text = manager.transcribe_encoded(&bytes)?;
    let _ = manager.cleanup();

    println!("{}", text);
    Ok(())
}

/// Print the effective configuration as TOML
fn show_config(config: &config::Config) -> anyhow::Result<()> {
    println!("# Effective voxd configuration");
    println!("# Models directory: {}", config.models_dir().display());
    println!();
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
