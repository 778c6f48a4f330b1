//! Cost transformer configuration

use serde::Deserialize;
use std::time::Duration;

/// Transformer configuration
///
/// # Example
///
/// ```toml
/// [transformer]
/// rate_per_second = 0.05
/// rate_per_unit = 0.01
/// workers = 2
/// processing_timeout = "1s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Cost per second of call duration
    /// Default: 0.1
    pub rate_per_second: f64,

    /// Cost per unit of data
    /// Default: 0.05
    pub rate_per_unit: f64,

    /// Concurrent transformer workers; more than one gives up ordering
    /// Default: 1
    pub workers: usize,

    /// Upper bound for handling one record
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub processing_timeout: Duration,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            rate_per_second: 0.1,
            rate_per_unit: 0.05,
            workers: 1,
            processing_timeout: Duration::from_secs(5),
        }
    }
}
