//! Queue abstraction shared by all channel backends

use std::time::Duration;

use async_trait::async_trait;

use crate::delivery::{ChannelState, Delivery, DeliveryToken};
use crate::error::Result;
use crate::metrics::ChannelSnapshot;

/// At-least-once queue between two pipeline stages
///
/// Blocking operations use the timeouts the backend was configured with.
/// Implementors must be `Send + Sync`; one queue is shared by its producer
/// and its consumers.
#[async_trait]
pub trait Queue<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Name for logs
    fn name(&self) -> &str;

    /// Enqueue, waiting up to the enqueue timeout for capacity
    async fn enqueue(&self, item: T) -> Result<()>;

    /// Enqueue without waiting
    fn try_enqueue(&self, item: T) -> Result<()>;

    /// Dequeue, waiting up to the dequeue timeout for a message
    async fn dequeue(&self) -> Result<Delivery<T>>;

    /// Acknowledge a delivery
    fn ack(&self, token: DeliveryToken) -> Result<()>;

    /// Hand a delivery back for redelivery after `delay`
    fn nack(&self, token: DeliveryToken, delay: Duration) -> Result<()>;

    /// Stop accepting messages, keep serving until empty
    fn drain(&self);

    /// Close immediately, returning the number of discarded messages
    fn close(&self) -> usize;

    /// Current lifecycle state
    fn state(&self) -> ChannelState;

    /// Resolve once the queue is closed
    async fn closed(&self);

    /// Counters and gauges
    fn snapshot(&self) -> ChannelSnapshot;

    /// Messages ready for delivery
    fn len(&self) -> usize {
        self.snapshot().depth
    }

    /// Whether nothing is ready or in flight
    fn is_empty(&self) -> bool {
        self.snapshot().outstanding() == 0
    }

    /// Messages delivered but not acknowledged
    fn in_flight(&self) -> usize {
        self.snapshot().in_flight
    }
}
