//! Check command
//!
//! Validates a configuration file (with environment overrides applied) and
//! prints the resolved pipeline layout.
//!
//! # Usage
//!
//! ```bash
//! tally check --config configs/tally.toml
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use tally_config::Config;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Configuration file to validate
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let Some(path) = args.config else {
        anyhow::bail!("no configuration file given, use --config PATH");
    };

    println!();
    println!("{}", "Tally Config Check".bold());
    println!("{}", "─".repeat(50));
    println!("File          {}", path.display().cyan());
    println!("{}", "─".repeat(50));
    println!();

    print!("Loading... ");
    let config = match Config::load(Some(&path)) {
        Ok(config) => {
            println!("{}", "✓".green());
            config
        }
        Err(e) => {
            println!("{}", "✗".red());
            println!("  {}", e.to_string().red());
            return Err(e.into());
        }
    };

    println!("Generator:");
    println!("  users         {}", config.generator.users.join(", "));
    println!("  interval      {:?}", config.generator.interval);
    println!("  backpressure  {}", config.generator.backpressure.as_str());
    println!("Transformer:");
    println!("  workers       {}", config.transformer.workers);
    println!(
        "  rates         {}/s, {}/unit",
        config.transformer.rate_per_second, config.transformer.rate_per_unit
    );
    println!("Logger:");
    println!("  sink          {:?}", config.logger.sink);
    println!("Channels:");
    println!("  backend       {:?}", config.channels.backend);
    println!(
        "  topics        {}, {}",
        config.channels.usage_topic(),
        config.channels.costs_topic()
    );
    println!("Dead letters:");
    println!("  destination   {}", config.dead_letter.destination);
    println!();

    println!("{}", "Configuration is valid!".green().bold());
    println!();

    Ok(())
}
