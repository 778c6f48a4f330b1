//! In-process broker
//!
//! Each topic is a `Channel<Bytes>`, so the broker inherits the channel's
//! capacity, visibility timeout and redelivery behaviour.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{AckHandle, Acknowledger, Message, Subscription, Transport, TransportError};
use crate::channel::{Channel, ChannelConfig};
use crate::delivery::DeliveryToken;
use crate::error::ChannelError;

/// In-process `Transport`
///
/// Topics are created on first use with the default config, or up front with
/// `declare_topic` for per-topic settings.
pub struct MemoryTransport {
    default_config: ChannelConfig,
    topics: Mutex<HashMap<String, Arc<Channel<Bytes>>>>,
}

impl MemoryTransport {
    /// Create a broker whose topics use `config`
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            default_config: config,
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Create (or replace) a topic with its own settings
    pub fn declare_topic(&self, topic: &str, config: ChannelConfig) -> Arc<Channel<Bytes>> {
        let channel = Arc::new(Channel::new(topic, config));
        self.topics
            .lock()
            .insert(topic.to_string(), Arc::clone(&channel));
        channel
    }

    /// Get a topic, creating it with the default config if needed
    pub fn topic(&self, topic: &str) -> Arc<Channel<Bytes>> {
        let mut topics = self.topics.lock();
        Arc::clone(topics.entry(topic.to_string()).or_insert_with(|| {
            tracing::debug!(topic, "creating topic");
            Arc::new(Channel::new(topic, self.default_config.clone()))
        }))
    }

    /// Names of all known topics
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn map_publish_error(topic: &str, err: ChannelError) -> TransportError {
        match err {
            ChannelError::Full => TransportError::PublishTimeout {
                topic: topic.to_string(),
                after: Duration::ZERO,
            },
            ChannelError::Timeout { after, .. } => TransportError::PublishTimeout {
                topic: topic.to_string(),
                after,
            },
            ChannelError::Draining | ChannelError::Closed => {
                TransportError::TopicClosed(topic.to_string())
            }
            other => TransportError::Unavailable(other.to_string()),
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let channel = self.topic(topic);
        let timeout = channel.config().enqueue_timeout;
        channel
            .enqueue_timeout(payload, timeout)
            .await
            .map_err(|e| Self::map_publish_error(topic, e))
    }

    fn try_publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        self.topic(topic)
            .try_enqueue(payload)
            .map_err(|e| Self::map_publish_error(topic, e))
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>, TransportError> {
        let channel = self.topic(topic);
        Ok(Box::new(MemorySubscription { channel }))
    }

    fn pending(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map_or(0, |channel| channel.snapshot().outstanding())
    }
}

struct MemorySubscription {
    channel: Arc<Channel<Bytes>>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> Result<Message, TransportError> {
        let timeout = self.channel.config().dequeue_timeout;
        match self.channel.dequeue_timeout(timeout).await {
            Ok(delivery) => {
                let token = delivery.token();
                let attempt = delivery.attempt();
                Ok(Message {
                    payload: delivery.into_payload(),
                    attempt,
                    ack: AckHandle::new(MemoryAck {
                        channel: Arc::clone(&self.channel),
                        token,
                    }),
                })
            }
            Err(ChannelError::Timeout { after, .. }) => Err(TransportError::PollTimeout(after)),
            Err(ChannelError::Closed) => Err(TransportError::TopicClosed(
                self.channel.name().to_string(),
            )),
            Err(other) => Err(TransportError::Unavailable(other.to_string())),
        }
    }
}

struct MemoryAck {
    channel: Arc<Channel<Bytes>>,
    token: DeliveryToken,
}

impl MemoryAck {
    fn map_err(&self, err: ChannelError) -> TransportError {
        match err {
            ChannelError::UnknownDelivery(token) => TransportError::StaleAck(token.to_string()),
            ChannelError::Closed => TransportError::TopicClosed(self.channel.name().to_string()),
            other => TransportError::Unavailable(other.to_string()),
        }
    }
}

impl Acknowledger for MemoryAck {
    fn ack(&self) -> Result<(), TransportError> {
        self.channel.ack(self.token).map_err(|e| self.map_err(e))
    }

    fn nack(&self, delay: Duration) -> Result<(), TransportError> {
        self.channel
            .nack(self.token, delay)
            .map_err(|e| self.map_err(e))
    }
}
