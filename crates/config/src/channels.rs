//! Channel configuration
//!
//! Two channels connect the stages: `usage` (generator -> transformer) and
//! `costs` (transformer -> logger). Both run either in-process (`local`) or
//! over the broker transport (`broker`) as named topics.

use serde::Deserialize;
use std::time::Duration;

/// Default topic of the usage channel
pub const DEFAULT_USAGE_TOPIC: &str = "usage-detail";

/// Default topic of the cost channel
pub const DEFAULT_COSTS_TOPIC: &str = "usage-cost";

/// Channel backend
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelBackend {
    /// Typed in-process channels (default)
    #[default]
    Local,
    /// Encoded records over the broker transport
    Broker,
}

/// Settings for one channel
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Broker topic; falls back to the channel's default topic
    pub topic: Option<String>,

    /// Maximum messages held (ready + in flight)
    /// Default: 1000
    pub capacity: usize,

    /// How long a blocking enqueue waits for capacity
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub enqueue_timeout: Duration,

    /// How long a blocking dequeue waits for a message
    /// Default: 500ms
    #[serde(with = "humantime_serde")]
    pub dequeue_timeout: Duration,

    /// How long an unacknowledged message stays hidden
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            topic: None,
            capacity: 1000,
            enqueue_timeout: Duration::from_secs(1),
            dequeue_timeout: Duration::from_millis(500),
            visibility_timeout: Duration::from_secs(30),
        }
    }
}

/// Channel configuration
///
/// # Example
///
/// ```toml
/// [channels]
/// backend = "broker"
///
/// [channels.usage]
/// capacity = 100
/// visibility_timeout = "10s"
///
/// [channels.costs]
/// topic = "costs-v2"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Backend used for both channels
    pub backend: ChannelBackend,

    /// Generator -> transformer
    pub usage: QueueConfig,

    /// Transformer -> logger
    pub costs: QueueConfig,
}

impl ChannelsConfig {
    /// Topic of the usage channel
    pub fn usage_topic(&self) -> &str {
        self.usage.topic.as_deref().unwrap_or(DEFAULT_USAGE_TOPIC)
    }

    /// Topic of the cost channel
    pub fn costs_topic(&self) -> &str {
        self.costs.topic.as_deref().unwrap_or(DEFAULT_COSTS_TOPIC)
    }
}
