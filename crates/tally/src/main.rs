//! Tally - Usage-cost streaming pipeline
//!
//! # Usage
//!
//! ```bash
//! # Run the pipeline (default)
//! tally
//! tally --config configs/tally.toml --log-level debug
//!
//! # Validate a configuration file
//! tally check --config configs/tally.toml
//!
//! # Inspect a file dead-letter store
//! tally dead-letters --path dead-letters.jsonl
//! ```

mod cmd;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tally_config::{Config, LogConfig, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tally - Usage-cost streaming pipeline
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline until Ctrl-C or SIGTERM
    Run(cmd::run::RunArgs),

    /// Validate a configuration file
    Check(cmd::check::CheckArgs),

    /// Print the records of a file dead-letter store
    DeadLetters(cmd::dead_letters::DeadLettersArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Run(mut args)) => {
            // CLI global --config overrides subcommand config if both specified
            if args.config.is_none() && cli.config.is_some() {
                args.config = cli.config;
            }
            args.config = cmd::run::resolve_config_path(args.config)?;
            let log = resolve_logging(cli.log_level.as_deref(), args.config.as_deref());
            init_logging(&log)?;
            cmd::run::run(args).await
        }
        Some(Command::Check(mut args)) => {
            if args.config.is_none() && cli.config.is_some() {
                args.config = cli.config;
            }
            // Check doesn't need logging - just outputs to stdout
            cmd::check::run(args)
        }
        Some(Command::DeadLetters(args)) => cmd::dead_letters::run(args).await,
        // No subcommand = run the pipeline
        None => {
            let config = cmd::run::resolve_config_path(cli.config)?;
            let log = resolve_logging(cli.log_level.as_deref(), config.as_deref());
            init_logging(&log)?;
            let args = cmd::run::RunArgs {
                config,
                json_report: false,
            };
            cmd::run::run(args).await
        }
    }
}

/// Resolve logging: CLI flag > config file and environment > default "info"
///
/// `config_path` is the already resolved config file, so the `[log]` section
/// of a default config file applies too.
fn resolve_logging(cli_level: Option<&str>, config_path: Option<&Path>) -> LogConfig {
    let mut log = Config::load(config_path)
        .map(|c| c.log)
        .unwrap_or_default();

    // CLI flag takes precedence, extra filter directives are kept
    if let Some(level) = cli_level {
        match level.parse() {
            Ok(level) => log.level = level,
            Err(e) => eprintln!("ignoring --log-level: {e}"),
        }
    }

    log
}

/// Initialize the tracing subscriber for logging
fn init_logging(log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(log.directives())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log filter: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Console => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tally_config::LogLevel;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_logging_from_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(&path, "[log]\nlevel = \"debug\"\n").unwrap();

        let log = resolve_logging(None, Some(&path));
        assert_eq!(log.level, LogLevel::Debug);
    }

    #[test]
    fn test_cli_level_overrides_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(&path, "[log]\nlevel = \"debug\"\n").unwrap();

        let log = resolve_logging(Some("warn"), Some(&path));
        assert_eq!(log.level, LogLevel::Warn);
    }

    #[test]
    fn test_invalid_cli_level_keeps_config_level() {
        let log = resolve_logging(Some("loud"), None);
        assert_eq!(log.level, LogConfig::default().level);
    }
}
