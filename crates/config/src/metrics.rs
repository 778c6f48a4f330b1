//! Metrics reporting configuration
//!
//! Controls the periodic stage/channel metrics report.
//!
//! # Defaults
//!
//! - `enabled`: true
//! - `interval`: 60s
//! - `format`: human

use serde::Deserialize;
use std::time::Duration;

/// Metrics output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsFormat {
    /// One human-readable line per stage and channel (default)
    #[default]
    Human,
    /// One JSON document per report
    Json,
}

/// Metrics configuration
///
/// # Example
///
/// ```toml
/// [metrics]
/// enabled = true
/// interval = "30s"
/// format = "json"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics reporting
    pub enabled: bool,

    /// Reporting interval
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Output format (human, json)
    pub format: MetricsFormat,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            format: MetricsFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty() {
        let config: MetricsConfig = toml::from_str("").unwrap();
        assert!(config.enabled);
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.format, MetricsFormat::Human);
    }

    #[test]
    fn test_deserialize_interval_variants() {
        for (s, expected) in [
            ("500ms", Duration::from_millis(500)),
            ("5s", Duration::from_secs(5)),
            ("2m", Duration::from_secs(120)),
        ] {
            let toml = format!("interval = \"{}\"", s);
            let config: MetricsConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config.interval, expected, "Failed for {}", s);
        }
    }

    #[test]
    fn test_deserialize_json_disabled() {
        let config: MetricsConfig = toml::from_str("enabled = false\nformat = \"json\"").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.format, MetricsFormat::Json);
    }
}
