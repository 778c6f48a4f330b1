//! Usage generator configuration

use serde::Deserialize;
use std::time::Duration;

/// What the generator does when the usage channel is full
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackpressureMode {
    /// Wait for capacity; retry the same record on the next tick (default)
    #[default]
    Block,
    /// Skip the tick and count it as dropped
    Drop,
}

impl BackpressureMode {
    /// Config spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Drop => "drop",
        }
    }
}

/// Generator configuration
///
/// # Example
///
/// ```toml
/// [generator]
/// interval = "2s"
/// users = ["user1", "user2"]
/// max_duration = 300
/// max_data = 700
/// seed = 42
/// backpressure = "drop"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Delay between ticks
    /// Default: 2s
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// User roster, sampled uniformly
    /// Default: user1..user5
    pub users: Vec<String>,

    /// Durations are drawn from `[0, max_duration)`
    /// Default: 300
    pub max_duration: i64,

    /// Data volumes are drawn from `[0, max_data)`
    /// Default: 700
    pub max_data: i64,

    /// Fixed RNG seed; random when unset
    pub seed: Option<u64>,

    /// Behaviour when the usage channel is full
    pub backpressure: BackpressureMode,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            users: default_users(),
            max_duration: 300,
            max_data: 700,
            seed: None,
            backpressure: BackpressureMode::Block,
        }
    }
}

/// `user1`..`user5`
pub fn default_users() -> Vec<String> {
    (1..=5).map(|i| format!("user{i}")).collect()
}
