//! Run command - Run the pipeline
//!
//! Generates usage, prices it and logs the costs until Ctrl-C or SIGTERM,
//! then drains both channels and prints the shutdown report.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use tokio::signal;
use tracing::{error, info};

use tally_config::Config;
use tally_pipeline::{PipelineBuilder, ShutdownReport, format_human, format_json};

/// Paths tried when no config file is given
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["configs/tally.toml", "tally.toml"];

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to configuration file (defaults to configs/tally.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the shutdown report as JSON
    #[arg(long)]
    pub json_report: bool,
}

/// Run the pipeline command
pub async fn run(args: RunArgs) -> Result<()> {
    let config_path = resolve_config_path(args.config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        config = %config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(default)".to_string()),
        "Tally starting"
    );

    let config = load_config(config_path.as_deref())?;

    let report = match run_pipeline(config).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "pipeline error");
            return Err(e);
        }
    };

    print_report(&report, args.json_report);
    info!("Tally shutdown complete");
    Ok(())
}

/// Pick the config file to use
///
/// An explicit path must exist. Without one, the first default path that
/// exists is used; `None` means defaults plus environment.
pub fn resolve_config_path(path: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match path {
        Some(path) if !path.exists() => {
            anyhow::bail!("config file not found: {}", path.display())
        }
        Some(path) => Ok(Some(path)),
        None => Ok(DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())),
    }
}

/// Load a resolved config path, or defaults when there is none
///
/// Environment overrides are applied in every case.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => info!(config = %path.display(), "using config file"),
        None => info!("no config file found, using defaults (5 users every 2s -> log sink)"),
    }

    Config::load(path).context("failed to load configuration")
}

async fn run_pipeline(config: Config) -> Result<ShutdownReport> {
    let pipeline = PipelineBuilder::from_config(&config)
        .await
        .context("failed to build pipeline")?
        .build()
        .context("failed to build pipeline")?;

    let running = pipeline.start();

    info!(
        users = config.generator.users.len(),
        interval = ?config.generator.interval,
        backend = ?config.channels.backend,
        dead_letters = %config.dead_letter.destination,
        metrics_enabled = config.metrics.enabled,
        "Tally running"
    );

    wait_for_shutdown().await;
    info!("shutdown signal received, draining pipeline...");

    Ok(running.shutdown().await)
}

fn print_report(report: &ShutdownReport, json: bool) {
    if json {
        println!("{}", format_json(&report.metrics, None));
        return;
    }

    println!();
    println!("{}", "Tally Shutdown Report".bold());
    println!("{}", "─".repeat(50));
    println!("Uptime        {:?}", report.uptime);
    println!("Dead letters  {}", report.metrics.dead_lettered());
    println!("Discarded     {}", report.discarded);
    println!("{}", "─".repeat(50));
    println!("{}", format_human(&report.metrics, None).dimmed());
    println!();

    if report.is_clean() {
        println!("{}", "Drained cleanly.".green().bold());
    } else {
        let forced: Vec<&str> = report.forced.iter().map(|k| k.as_str()).collect();
        println!(
            "{}",
            format!(
                "Forced stop: [{}], {} message(s) discarded.",
                forced.join(", "),
                report.discarded
            )
            .yellow()
        );
    }
    println!();
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");

        let err = resolve_config_path(Some(missing)).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_explicit_config_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(&path, "").unwrap();

        let resolved = resolve_config_path(Some(path.clone())).unwrap();
        assert_eq!(resolved, Some(path));
    }
}
