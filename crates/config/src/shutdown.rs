//! Shutdown configuration

use serde::Deserialize;
use std::time::Duration;

/// Shutdown configuration
///
/// ```toml
/// [shutdown]
/// grace = "15s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time each stage gets to drain before it is stopped hard
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub grace: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
        }
    }
}
