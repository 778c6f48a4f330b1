//! Typed queue over a broker transport
//!
//! Records are encoded with the versioned codec on enqueue and decoded on
//! dequeue. Draining is tracked locally: once draining, the queue refuses
//! new records and reports `Closed` when the broker holds nothing more for
//! the topic and every local delivery was settled.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tally_protocol::{Payload, decode, encode};
use tokio::sync::Notify;

use super::{AckHandle, Subscription, Transport, TransportError};
use crate::delivery::{ChannelState, Delivery, DeliveryToken};
use crate::error::{ChannelError, Result};
use crate::metrics::{ChannelMetrics, ChannelSnapshot};
use crate::queue::Queue;

/// `Queue<T>` backed by a `Transport` topic
pub struct TransportQueue<T> {
    topic: String,
    transport: Arc<dyn Transport>,
    subscription: tokio::sync::Mutex<Box<dyn Subscription>>,
    handles: Mutex<HashMap<u64, AckHandle>>,
    next_id: AtomicU64,
    state: Mutex<ChannelState>,
    state_changed: Notify,
    metrics: ChannelMetrics,
    _record: PhantomData<fn() -> T>,
}

impl<T: Payload> TransportQueue<T> {
    /// Subscribe to `topic` and build the queue
    pub async fn connect(transport: Arc<dyn Transport>, topic: impl Into<String>) -> Result<Self> {
        let topic = topic.into();
        let subscription = transport.subscribe(&topic).await?;

        tracing::info!(topic = %topic, kind = T::KIND, "transport queue connected");

        Ok(Self {
            topic,
            transport,
            subscription: tokio::sync::Mutex::new(subscription),
            handles: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            state: Mutex::new(ChannelState::Open),
            state_changed: Notify::new(),
            metrics: ChannelMetrics::new(),
            _record: PhantomData,
        })
    }

    /// Topic this queue publishes to and consumes from
    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn current_state(&self) -> ChannelState {
        *self.state.lock()
    }

    fn set_state(&self, state: ChannelState) {
        *self.state.lock() = state;
        self.state_changed.notify_waiters();
    }

    fn check_accepting(&self) -> Result<()> {
        match self.current_state() {
            ChannelState::Open => Ok(()),
            ChannelState::Draining => {
                self.metrics.record_rejected();
                Err(ChannelError::Draining)
            }
            ChannelState::Closed => Err(ChannelError::Closed),
        }
    }

    fn encode_record(&self, record: &T) -> Result<bytes::Bytes> {
        encode(record).map_err(|e| ChannelError::transport(format!("encode failed: {e}")))
    }

    /// Close a draining queue once nothing is left; returns true if closed
    fn settle(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            ChannelState::Closed => true,
            ChannelState::Open => false,
            ChannelState::Draining => {
                let idle =
                    self.handles.lock().is_empty() && self.transport.pending(&self.topic) == 0;
                if idle {
                    *state = ChannelState::Closed;
                    drop(state);
                    tracing::debug!(topic = %self.topic, "transport queue drained");
                    self.state_changed.notify_waiters();
                }
                idle
            }
        }
    }

    fn take_handle(&self, token: DeliveryToken) -> Result<AckHandle> {
        self.handles
            .lock()
            .remove(&token.id())
            .ok_or(ChannelError::UnknownDelivery(token))
    }
}

#[async_trait]
impl<T: Payload> Queue<T> for TransportQueue<T> {
    fn name(&self) -> &str {
        &self.topic
    }

    async fn enqueue(&self, item: T) -> Result<()> {
        self.check_accepting()?;
        let bytes = self.encode_record(&item)?;
        match self.transport.publish(&self.topic, bytes).await {
            Ok(()) => {
                self.metrics.record_enqueued();
                Ok(())
            }
            Err(e) => {
                self.metrics.record_rejected();
                Err(e.into())
            }
        }
    }

    fn try_enqueue(&self, item: T) -> Result<()> {
        self.check_accepting()?;
        let bytes = self.encode_record(&item)?;
        match self.transport.try_publish(&self.topic, bytes) {
            Ok(()) => {
                self.metrics.record_enqueued();
                Ok(())
            }
            Err(TransportError::PublishTimeout { .. }) => {
                self.metrics.record_rejected();
                Err(ChannelError::Full)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn dequeue(&self) -> Result<Delivery<T>> {
        if self.current_state() == ChannelState::Closed || self.settle() {
            return Err(ChannelError::Closed);
        }

        let received = self.subscription.lock().await.next().await;
        let message = match received {
            Ok(message) => message,
            Err(TransportError::PollTimeout(after)) => {
                if self.settle() {
                    return Err(ChannelError::Closed);
                }
                return Err(ChannelError::timeout("dequeue", after));
            }
            Err(TransportError::TopicClosed(_)) => {
                self.set_state(ChannelState::Closed);
                return Err(ChannelError::Closed);
            }
            Err(e) => return Err(e.into()),
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = DeliveryToken::new(id, id);
        let attempt = message.attempt;

        self.metrics.record_dequeued();
        if attempt > 1 {
            self.metrics.record_redelivered(1);
        }

        let decoded = decode::<T>(&message.payload);
        self.handles.lock().insert(id, message.ack);

        match decoded {
            Ok(record) => Ok(Delivery::new(token, attempt, record)),
            Err(e) => Err(ChannelError::Malformed {
                token,
                attempt,
                raw: message.payload,
                reason: e.to_string(),
            }),
        }
    }

    fn ack(&self, token: DeliveryToken) -> Result<()> {
        let handle = self.take_handle(token)?;
        handle.ack()?;
        self.metrics.record_acked();
        self.settle();
        Ok(())
    }

    fn nack(&self, token: DeliveryToken, delay: Duration) -> Result<()> {
        let handle = self.take_handle(token)?;
        handle.nack(delay)?;
        self.metrics.record_nacked();
        Ok(())
    }

    fn drain(&self) {
        {
            let mut state = self.state.lock();
            if *state != ChannelState::Open {
                return;
            }
            *state = ChannelState::Draining;
        }
        tracing::info!(
            topic = %self.topic,
            pending = self.transport.pending(&self.topic),
            "transport queue draining"
        );
        self.state_changed.notify_waiters();
        self.settle();
    }

    /// Unacknowledged deliveries are released to the broker, which hands
    /// them out again after its visibility timeout.
    fn close(&self) -> usize {
        let released = {
            let mut handles = self.handles.lock();
            let count = handles.len();
            handles.clear();
            count
        };
        self.set_state(ChannelState::Closed);
        if released > 0 {
            tracing::warn!(topic = %self.topic, released, "transport queue closed with unacknowledged deliveries");
        }
        released
    }

    fn state(&self) -> ChannelState {
        self.current_state()
    }

    async fn closed(&self) {
        loop {
            let changed = self.state_changed.notified();
            if self.current_state() == ChannelState::Closed {
                return;
            }
            changed.await;
        }
    }

    fn snapshot(&self) -> ChannelSnapshot {
        let in_flight = self.handles.lock().len();
        let pending = self.transport.pending(&self.topic);
        self.metrics.snapshot(
            self.current_state(),
            pending.saturating_sub(in_flight),
            in_flight,
        )
    }
}
