//! Dead-letters command
//!
//! Prints the records of a file dead-letter store, one line per letter or as
//! raw JSON lines.
//!
//! # Usage
//!
//! ```bash
//! tally dead-letters --path dead-letters.jsonl
//! tally dead-letters --path dead-letters.jsonl --stage logger --json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use tally_sinks::DeadLetter;
use tally_sinks::dead_letter::read_all;

#[derive(Args, Debug)]
pub struct DeadLettersArgs {
    /// Dead-letter file written by a `file:<path>` destination
    #[arg(short, long)]
    pub path: PathBuf,

    /// Only show letters from this stage (generator, transformer, logger)
    #[arg(long)]
    pub stage: Option<String>,

    /// Output raw JSON lines
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: DeadLettersArgs) -> Result<()> {
    let letters = read_all(&args.path)
        .await
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    let letters: Vec<DeadLetter> = match args.stage.as_deref() {
        Some(stage) => letters.into_iter().filter(|l| l.stage == stage).collect(),
        None => letters,
    };

    if args.json {
        for letter in &letters {
            println!("{}", serde_json::to_string(letter)?);
        }
        return Ok(());
    }

    for letter in &letters {
        println!("{}", format_letter(letter));
    }
    println!();
    println!("{} dead letter(s)", letters.len().bold());

    Ok(())
}

fn format_letter(letter: &DeadLetter) -> String {
    format!(
        "#{:<5} {} {:<11} {:<14} attempts={} {} {}",
        letter.id,
        letter.timestamp.format("%Y-%m-%d %H:%M:%S").dimmed(),
        letter.stage.cyan(),
        letter.class.yellow(),
        letter.attempts,
        letter.payload,
        letter.reason.red()
    )
}
