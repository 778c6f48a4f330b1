//! Delivery envelope and channel state

use std::fmt;

/// Lifecycle state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Accepts enqueue and dequeue
    Open,
    /// Rejects enqueue, serves dequeue until empty
    Draining,
    /// Every operation fails
    Closed,
}

impl ChannelState {
    /// Lowercase name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement token for one delivery of one message
///
/// `id` identifies the message, `lease` identifies this particular delivery.
/// A redelivery hands out a new lease, so a consumer that lost its lease
/// (visibility timeout) cannot acknowledge the newer delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryToken {
    id: u64,
    lease: u64,
}

impl DeliveryToken {
    /// Create a token
    #[inline]
    pub const fn new(id: u64, lease: u64) -> Self {
        Self { id, lease }
    }

    /// Message identifier (monotonic per channel, follows enqueue order)
    #[inline]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Lease identifier of this delivery
    #[inline]
    pub const fn lease(&self) -> u64 {
        self.lease
    }
}

impl fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg:{}/{}", self.id, self.lease)
    }
}

/// A message handed to a consumer
///
/// The payload is a copy: the channel keeps the original until the delivery
/// is acknowledged so it can hand it out again.
#[derive(Debug, Clone)]
pub struct Delivery<T> {
    token: DeliveryToken,
    attempt: u32,
    payload: T,
}

impl<T> Delivery<T> {
    /// Create a delivery
    #[inline]
    pub fn new(token: DeliveryToken, attempt: u32, payload: T) -> Self {
        Self {
            token,
            attempt,
            payload,
        }
    }

    /// Token to pass to `ack`/`nack`
    #[inline]
    pub fn token(&self) -> DeliveryToken {
        self.token
    }

    /// Delivery attempt, starting at 1
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether this message was handed out before
    #[inline]
    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }

    /// Borrow the payload
    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Take the payload
    #[inline]
    pub fn into_payload(self) -> T {
        self.payload
    }
}
