//! Retry configuration for transient stage failures

use serde::Deserialize;
use std::time::Duration;

/// Retry configuration
///
/// A failing record is retried `max_retries` times. The delay before retry
/// `n` (1-based) is `initial_backoff * multiplier^(n-1)`, capped at
/// `max_backoff`, with up to `jitter_factor` of it randomised.
///
/// # Example
///
/// ```toml
/// [retry]
/// max_retries = 5
/// initial_backoff = "200ms"
/// max_backoff = "30s"
/// multiplier = 2.0
/// jitter_factor = 0.0
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries before a record is dead-lettered
    /// Default: 3
    pub max_retries: u32,

    /// Delay before the first retry
    /// Default: 100ms
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound for any delay
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Growth factor between retries
    /// Default: 2.0
    pub multiplier: f64,

    /// Fraction of each delay that is randomised (0..=1)
    /// Default: 0.1
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: RetryConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff, Duration::from_millis(100));
        assert_eq!(config.max_backoff, Duration::from_secs(10));
        assert_eq!(config.multiplier, 2.0);
    }

    #[test]
    fn test_disable_retries() {
        let config: RetryConfig = toml::from_str("max_retries = 0").unwrap();
        assert_eq!(config.max_retries, 0);
    }
}
