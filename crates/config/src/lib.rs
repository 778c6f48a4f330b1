//! Tally Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file runs the pipeline exactly like the defaults below; only
//! specify what you need to change.
//!
//! # Parsing
//!
//! ```
//! use tally_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[generator]\nusers = [\"user1\"]").unwrap();
//! assert_eq!(config.generator.users, vec!["user1"]);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [generator]
//! interval = "2s"
//! users = ["user1", "user2", "user3", "user4", "user5"]
//!
//! [transformer]
//! rate_per_second = 0.1
//! rate_per_unit = 0.05
//!
//! [logger]
//! sink = "stdout"
//!
//! [channels.usage]
//! capacity = 1000
//!
//! [retry]
//! max_retries = 3
//!
//! [dead_letter]
//! destination = "file:dead-letters.jsonl"
//! ```
//!
//! # Environment
//!
//! `TALLY_*` variables override file values after parsing; see [`env`].

mod channels;
mod dead_letter;
pub mod env;
mod error;
mod generator;
mod health;
mod logger;
mod logging;
mod metrics;
mod retry;
mod shutdown;
mod transformer;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use channels::{
    ChannelBackend, ChannelsConfig, DEFAULT_COSTS_TOPIC, DEFAULT_USAGE_TOPIC, QueueConfig,
};
pub use dead_letter::{DeadLetterConfig, DeadLetterDestination};
pub use error::{ConfigError, Result};
pub use generator::{BackpressureMode, GeneratorConfig, default_users};
pub use health::HealthConfig;
pub use logger::{LoggerConfig, LoggerSinkKind, OutputFormat};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use metrics::{MetricsConfig, MetricsFormat};
pub use retry::RetryConfig;
pub use shutdown::ShutdownConfig;
pub use transformer::TransformerConfig;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Usage generator
    pub generator: GeneratorConfig,

    /// Cost transformer
    pub transformer: TransformerConfig,

    /// Cost record sink
    pub logger: LoggerConfig,

    /// Channels between stages
    pub channels: ChannelsConfig,

    /// Retry policy for transient failures
    pub retry: RetryConfig,

    /// Dead-letter destination
    pub dead_letter: DeadLetterConfig,

    /// Stage health policy
    pub health: HealthConfig,

    /// Shutdown behaviour
    pub shutdown: ShutdownConfig,

    /// Metrics reporting
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Load from an optional file, then apply environment overrides
    ///
    /// Without a file the defaults are used. The result is validated after
    /// the overrides, so an override cannot sneak in an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |var| std::env::var(var).ok())
    }

    /// `load` with an injectable environment lookup
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Parsed dead-letter destination
    ///
    /// Only fails on an unvalidated config.
    pub fn dead_letter_destination(&self) -> Result<DeadLetterDestination> {
        self.dead_letter
            .parsed()
            .map_err(|msg| ConfigError::invalid_value("dead_letter", "destination", msg))
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
