//! In-process at-least-once channel
//!
//! `Channel<T>` is a bounded FIFO with explicit acknowledgement. All state
//! lives behind one `parking_lot::Mutex`; waiting producers and consumers
//! park on `tokio::sync::Notify` and re-check state when woken.
//!
//! # Invariants
//!
//! - `ready` is ordered by message id (enqueue order), including redelivered
//!   messages which are re-inserted at their original position.
//! - `ready.len() + in_flight.len() <= capacity`
//! - A `Draining` channel with nothing ready and nothing in flight is
//!   `Closed`.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::delivery::{ChannelState, Delivery, DeliveryToken};
use crate::error::{ChannelError, Result};
use crate::metrics::{ChannelMetrics, ChannelSnapshot};
use crate::queue::Queue;

/// Channel configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Maximum messages held (ready + in flight)
    pub capacity: usize,

    /// How long a blocking enqueue waits for capacity
    pub enqueue_timeout: Duration,

    /// How long a blocking dequeue waits for a message
    pub dequeue_timeout: Duration,

    /// How long a delivered message stays hidden before redelivery
    pub visibility_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: crate::DEFAULT_CAPACITY,
            enqueue_timeout: Duration::from_secs(1),
            dequeue_timeout: Duration::from_millis(500),
            visibility_timeout: Duration::from_secs(30),
        }
    }
}

impl ChannelConfig {
    /// Config with the given capacity and default timeouts
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Set the visibility timeout
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Set the enqueue timeout
    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    /// Set the dequeue timeout
    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }
}

/// Bounded at-least-once FIFO channel
///
/// # Example
///
/// ```ignore
/// let channel = Channel::new("usage", ChannelConfig::with_capacity(100));
///
/// channel.enqueue(detail).await?;
///
/// let delivery = channel.dequeue().await?;
/// process(delivery.payload())?;
/// channel.ack(delivery.token())?;
/// ```
pub struct Channel<T> {
    name: String,
    config: ChannelConfig,
    inner: Mutex<Inner<T>>,

    /// Woken when a message may be available or the state changed
    readable: Notify,

    /// Woken when capacity may be available or the state changed
    writable: Notify,

    metrics: ChannelMetrics,
}

struct Entry<T> {
    id: u64,
    attempts: u32,
    payload: T,
}

struct Leased<T> {
    entry: Entry<T>,
    lease: u64,
    visible_at: Instant,
    /// Returned by the consumer rather than timed out
    nacked: bool,
}

struct Inner<T> {
    state: ChannelState,
    ready: VecDeque<Entry<T>>,
    in_flight: HashMap<u64, Leased<T>>,
    next_id: u64,
    next_lease: u64,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            state: ChannelState::Open,
            ready: VecDeque::new(),
            in_flight: HashMap::new(),
            next_id: 0,
            next_lease: 0,
        }
    }

    #[inline]
    fn occupancy(&self) -> usize {
        self.ready.len() + self.in_flight.len()
    }

    fn take_lease(&mut self) -> u64 {
        self.next_lease += 1;
        self.next_lease
    }

    /// Insert keeping id order
    fn insert_ready(&mut self, entry: Entry<T>) {
        let pos = self.ready.partition_point(|e| e.id < entry.id);
        self.ready.insert(pos, entry);
    }

    /// Move every lease whose visibility expired back to `ready`
    ///
    /// Returns the number of visibility timeouts (nacked messages coming
    /// back after their delay are not counted).
    fn reclaim_expired(&mut self, now: Instant) -> u64 {
        let expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, leased)| leased.visible_at <= now)
            .map(|(&id, _)| id)
            .collect();

        let mut timed_out = 0;
        for id in expired {
            if let Some(leased) = self.in_flight.remove(&id) {
                if !leased.nacked {
                    timed_out += 1;
                }
                self.insert_ready(leased.entry);
            }
        }
        timed_out
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.in_flight.values().map(|l| l.visible_at).min()
    }

    fn lease_matches(&self, token: DeliveryToken) -> bool {
        self.in_flight
            .get(&token.id())
            .is_some_and(|leased| leased.lease == token.lease())
    }

    /// Close a draining channel once it holds nothing
    ///
    /// Returns true if the state changed.
    fn settle(&mut self) -> bool {
        if self.state == ChannelState::Draining && self.occupancy() == 0 {
            self.state = ChannelState::Closed;
            true
        } else {
            false
        }
    }
}

impl<T> Channel<T> {
    /// Create an open channel
    pub fn new(name: impl Into<String>, config: ChannelConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner::new()),
            readable: Notify::new(),
            writable: Notify::new(),
            metrics: ChannelMetrics::new(),
        }
    }

    /// Channel name for logs
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Channel configuration
    #[inline]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Maximum messages held
    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChannelState {
        self.inner.lock().state
    }

    /// Messages ready for delivery
    pub fn len(&self) -> usize {
        self.inner.lock().ready.len()
    }

    /// Whether the channel holds no messages at all (ready or in flight)
    pub fn is_empty(&self) -> bool {
        self.inner.lock().occupancy() == 0
    }

    /// Messages delivered but not acknowledged
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Counters and gauges
    pub fn snapshot(&self) -> ChannelSnapshot {
        let inner = self.inner.lock();
        self.metrics
            .snapshot(inner.state, inner.ready.len(), inner.in_flight.len())
    }

    fn notify_all(&self) {
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    fn check_accepting(&self, inner: &Inner<T>) -> Result<()> {
        match inner.state {
            ChannelState::Open => Ok(()),
            ChannelState::Draining => {
                self.metrics.record_rejected();
                Err(ChannelError::Draining)
            }
            ChannelState::Closed => Err(ChannelError::Closed),
        }
    }

    fn push(&self, inner: &mut Inner<T>, item: T) {
        let id = inner.next_id;
        inner.next_id += 1;
        inner.ready.push_back(Entry {
            id,
            attempts: 0,
            payload: item,
        });
        self.metrics.record_enqueued();
        self.readable.notify_waiters();
    }

    /// Enqueue without waiting
    ///
    /// # Errors
    ///
    /// `Full` at capacity, `Draining` or `Closed` when not accepting.
    pub fn try_enqueue(&self, item: T) -> Result<()> {
        let mut inner = self.inner.lock();
        self.check_accepting(&inner)?;
        if inner.occupancy() >= self.config.capacity {
            self.metrics.record_rejected();
            return Err(ChannelError::Full);
        }
        self.push(&mut inner, item);
        Ok(())
    }

    /// Enqueue, waiting up to `timeout` for capacity
    pub async fn enqueue_timeout(&self, item: T, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            // Registered before the check so a wakeup in between is not lost
            let writable = self.writable.notified();
            {
                let mut inner = self.inner.lock();
                self.check_accepting(&inner)?;
                if inner.occupancy() < self.config.capacity {
                    self.push(&mut inner, item);
                    return Ok(());
                }
            }

            if tokio::time::timeout_at(deadline, writable).await.is_err() {
                self.metrics.record_rejected();
                return Err(ChannelError::timeout("enqueue", timeout));
            }
        }
    }

    /// Acknowledge a delivery, removing the message for good
    ///
    /// # Errors
    ///
    /// `UnknownDelivery` if the token was already acked or its lease was
    /// superseded by a redelivery; `Closed` after close.
    pub fn ack(&self, token: DeliveryToken) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == ChannelState::Closed {
            return Err(ChannelError::Closed);
        }
        if !inner.lease_matches(token) {
            return Err(ChannelError::UnknownDelivery(token));
        }

        inner.in_flight.remove(&token.id());
        self.metrics.record_acked();

        if inner.settle() {
            tracing::debug!(channel = %self.name, "channel drained");
        }
        drop(inner);

        self.notify_all();
        Ok(())
    }

    /// Return a delivery so it is handed out again after `delay`
    ///
    /// The token becomes stale immediately.
    pub fn nack(&self, token: DeliveryToken, delay: Duration) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == ChannelState::Closed {
            return Err(ChannelError::Closed);
        }
        if !inner.lease_matches(token) {
            return Err(ChannelError::UnknownDelivery(token));
        }

        if delay.is_zero() {
            if let Some(leased) = inner.in_flight.remove(&token.id()) {
                inner.insert_ready(leased.entry);
            }
        } else {
            let lease = inner.take_lease();
            if let Some(leased) = inner.in_flight.get_mut(&token.id()) {
                leased.lease = lease;
                leased.visible_at = Instant::now() + delay;
                leased.nacked = true;
            }
        }
        self.metrics.record_nacked();
        drop(inner);

        self.readable.notify_waiters();
        Ok(())
    }

    /// Stop accepting new messages; keep serving until empty
    pub fn drain(&self) {
        let mut inner = self.inner.lock();
        if inner.state != ChannelState::Open {
            return;
        }
        inner.state = ChannelState::Draining;
        let remaining = inner.occupancy();
        inner.settle();
        let state = inner.state;
        drop(inner);

        tracing::info!(channel = %self.name, remaining, state = %state, "channel draining");
        self.notify_all();
    }

    /// Close immediately, discarding anything still held
    ///
    /// Returns the number of discarded messages.
    pub fn close(&self) -> usize {
        let mut inner = self.inner.lock();
        let discarded = inner.occupancy();
        inner.ready.clear();
        inner.in_flight.clear();
        inner.state = ChannelState::Closed;
        drop(inner);

        if discarded > 0 {
            tracing::warn!(channel = %self.name, discarded, "channel closed with undelivered messages");
        }
        self.notify_all();
        discarded
    }

    /// Wait until the channel is closed
    pub async fn closed(&self) {
        loop {
            let readable = self.readable.notified();
            if self.state() == ChannelState::Closed {
                return;
            }
            readable.await;
        }
    }
}

impl<T: Clone> Channel<T> {
    fn lease_next(&self, inner: &mut Inner<T>, now: Instant) -> Option<Delivery<T>> {
        let mut entry = inner.ready.pop_front()?;
        entry.attempts += 1;
        let lease = inner.take_lease();

        let delivery = Delivery::new(
            DeliveryToken::new(entry.id, lease),
            entry.attempts,
            entry.payload.clone(),
        );

        inner.in_flight.insert(
            entry.id,
            Leased {
                entry,
                lease,
                visible_at: now + self.config.visibility_timeout,
                nacked: false,
            },
        );
        self.metrics.record_dequeued();
        Some(delivery)
    }

    /// Dequeue, waiting up to `timeout` for a message
    ///
    /// Expired leases are reclaimed first, so a message whose consumer went
    /// away is handed out again (with a higher attempt number) before newer
    /// messages.
    ///
    /// # Errors
    ///
    /// `Timeout` if nothing became available, `Closed` once the channel is
    /// closed or a draining channel ran empty.
    pub async fn dequeue_timeout(&self, timeout: Duration) -> Result<Delivery<T>> {
        let deadline = Instant::now() + timeout;

        loop {
            let readable = self.readable.notified();
            let wake_at = {
                let mut inner = self.inner.lock();
                if inner.state == ChannelState::Closed {
                    return Err(ChannelError::Closed);
                }

                let now = Instant::now();
                let timed_out = inner.reclaim_expired(now);
                if timed_out > 0 {
                    self.metrics.record_redelivered(timed_out);
                    tracing::debug!(
                        channel = %self.name,
                        count = timed_out,
                        "visibility timeout expired, redelivering"
                    );
                }

                if let Some(delivery) = self.lease_next(&mut inner, now) {
                    return Ok(delivery);
                }

                if inner.settle() {
                    drop(inner);
                    tracing::debug!(channel = %self.name, "channel drained");
                    self.notify_all();
                    return Err(ChannelError::Closed);
                }

                if now >= deadline {
                    return Err(ChannelError::timeout("dequeue", timeout));
                }

                inner
                    .next_visible_at()
                    .map_or(deadline, |at| at.min(deadline))
            };

            // Either woken by a producer/ack or the next lease expires
            let _ = tokio::time::timeout_at(wake_at, readable).await;
        }
    }
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("ready", &inner.ready.len())
            .field("in_flight", &inner.in_flight.len())
            .field("capacity", &self.config.capacity)
            .finish()
    }
}

#[async_trait]
impl<T> Queue<T> for Channel<T>
where
    T: Clone + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, item: T) -> Result<()> {
        self.enqueue_timeout(item, self.config.enqueue_timeout).await
    }

    fn try_enqueue(&self, item: T) -> Result<()> {
        Channel::try_enqueue(self, item)
    }

    async fn dequeue(&self) -> Result<Delivery<T>> {
        self.dequeue_timeout(self.config.dequeue_timeout).await
    }

    fn ack(&self, token: DeliveryToken) -> Result<()> {
        Channel::ack(self, token)
    }

    fn nack(&self, token: DeliveryToken, delay: Duration) -> Result<()> {
        Channel::nack(self, token, delay)
    }

    fn drain(&self) {
        Channel::drain(self)
    }

    fn close(&self) -> usize {
        Channel::close(self)
    }

    fn state(&self) -> ChannelState {
        Channel::state(self)
    }

    async fn closed(&self) {
        Channel::closed(self).await
    }

    fn snapshot(&self) -> ChannelSnapshot {
        Channel::snapshot(self)
    }
}
