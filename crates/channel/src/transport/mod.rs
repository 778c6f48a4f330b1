//! Broker transport binding
//!
//! The minimal surface a message broker client has to offer for the pipeline
//! to run on top of it: publish bytes to a topic, subscribe to a topic and
//! receive `(bytes, ack handle)` pairs with at-least-once semantics.
//!
//! - `MemoryTransport` - in-process broker backed by one `Channel<Bytes>`
//!   per topic
//! - `TransportQueue<T>` - typed `Queue<T>` over any `Transport`, using the
//!   versioned codec from `tally-protocol`

mod memory;
mod queue;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::error::ChannelError;

pub use memory::MemoryTransport;
pub use queue::TransportQueue;

/// Errors reported by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Broker could not take the message in time
    #[error("publish to '{topic}' timed out after {after:?}")]
    PublishTimeout {
        /// Target topic
        topic: String,
        /// How long the publish waited (zero for non-blocking publishes)
        after: Duration,
    },

    /// No message arrived within the poll timeout
    #[error("no message within {0:?}")]
    PollTimeout(Duration),

    /// Topic no longer accepts messages or was closed
    #[error("topic '{0}' is closed")]
    TopicClosed(String),

    /// Ack/nack for a delivery the broker no longer tracks
    #[error("stale acknowledgement: {0}")]
    StaleAck(String),

    /// Any other broker failure
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

impl From<TransportError> for ChannelError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::PublishTimeout { after, .. } => ChannelError::timeout("enqueue", after),
            TransportError::PollTimeout(after) => ChannelError::timeout("dequeue", after),
            TransportError::TopicClosed(_) => ChannelError::Closed,
            TransportError::StaleAck(_) | TransportError::Unavailable(_) => {
                ChannelError::transport(err.to_string())
            }
        }
    }
}

/// Broker-side acknowledgement of one delivery
pub trait Acknowledger: Send + Sync {
    /// Mark the delivery as processed
    fn ack(&self) -> Result<(), TransportError>;

    /// Make the message deliverable again after `delay`
    fn nack(&self, delay: Duration) -> Result<(), TransportError>;
}

/// Owned acknowledgement handle, consumed by `ack`/`nack`
pub struct AckHandle(Box<dyn Acknowledger>);

impl AckHandle {
    /// Wrap a broker acknowledger
    pub fn new(acknowledger: impl Acknowledger + 'static) -> Self {
        Self(Box::new(acknowledger))
    }

    /// Acknowledge the delivery
    pub fn ack(self) -> Result<(), TransportError> {
        self.0.ack()
    }

    /// Return the delivery for redelivery after `delay`
    pub fn nack(self, delay: Duration) -> Result<(), TransportError> {
        self.0.nack(delay)
    }
}

impl std::fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckHandle").finish_non_exhaustive()
    }
}

/// One message received from a subscription
#[derive(Debug)]
pub struct Message {
    /// Raw payload
    pub payload: Bytes,
    /// Delivery attempt, starting at 1
    pub attempt: u32,
    /// Handle to acknowledge this delivery
    pub ack: AckHandle,
}

/// Stream of messages from one topic
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next message
    ///
    /// Returns `PollTimeout` when nothing arrived within the broker's poll
    /// timeout and `TopicClosed` once the topic is closed.
    async fn next(&mut self) -> Result<Message, TransportError>;
}

/// Broker binding used by `TransportQueue`
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish bytes to a topic, waiting for the broker to accept them
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Publish without waiting; fails with `PublishTimeout` if the broker
    /// cannot take the message right now
    fn try_publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Subscribe to a topic
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>, TransportError>;

    /// Messages the broker still holds for a topic (ready or unacknowledged)
    fn pending(&self, topic: &str) -> usize;
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
