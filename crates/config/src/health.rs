//! Stage health policy configuration

use serde::Deserialize;
use std::time::Duration;

/// Health policy
///
/// Each stage records its outcomes in a sliding window. Once the window
/// holds at least `min_samples` outcomes and the failure ratio reaches
/// `error_rate_threshold`, the stage pauses for `pause`.
///
/// # Example
///
/// ```toml
/// [health]
/// window = "10s"
/// min_samples = 10
/// error_rate_threshold = 0.5
/// pause = "5s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Enable pausing unhealthy stages
    /// Default: true
    pub enabled: bool,

    /// Sliding window length
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub window: Duration,

    /// Outcomes needed before the ratio is evaluated
    /// Default: 10
    pub min_samples: usize,

    /// Failure ratio (0..=1] that pauses the stage
    /// Default: 0.5
    pub error_rate_threshold: f64,

    /// How long an unhealthy stage pauses
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub pause: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(10),
            min_samples: 10,
            error_rate_threshold: 0.5,
            pause: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: HealthConfig = toml::from_str("").unwrap();
        assert!(config.enabled);
        assert_eq!(config.window, Duration::from_secs(10));
        assert_eq!(config.min_samples, 10);
        assert_eq!(config.error_rate_threshold, 0.5);
        assert_eq!(config.pause, Duration::from_secs(5));
    }

    #[test]
    fn test_deserialize() {
        let config: HealthConfig =
            toml::from_str("window = \"1m\"\nerror_rate_threshold = 0.25").unwrap();
        assert_eq!(config.window, Duration::from_secs(60));
        assert_eq!(config.error_rate_threshold, 0.25);
    }
}
