//! Channel error types

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::delivery::DeliveryToken;

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors returned by channel operations
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Channel is at capacity (non-blocking enqueue)
    #[error("channel full")]
    Full,

    /// Blocking operation did not complete in time
    #[error("{op} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out ("enqueue" or "dequeue")
        op: &'static str,
        /// Configured timeout
        after: Duration,
    },

    /// Channel is draining and no longer accepts messages
    #[error("channel is draining")]
    Draining,

    /// Channel is closed
    #[error("channel closed")]
    Closed,

    /// Token does not match a current delivery (already acked or redelivered)
    #[error("unknown delivery: {0}")]
    UnknownDelivery(DeliveryToken),

    /// Message bytes could not be decoded into the channel's record type
    ///
    /// The delivery is still outstanding: the caller decides whether to ack
    /// it (after storing `raw` somewhere) or leave it for redelivery.
    #[error("malformed message {token}: {reason}")]
    Malformed {
        /// Token of the undecodable delivery
        token: DeliveryToken,
        /// Delivery attempt
        attempt: u32,
        /// Raw bytes as received
        raw: Bytes,
        /// Decode error
        reason: String,
    },

    /// Underlying transport failed
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChannelError {
    /// Create a timeout error
    #[inline]
    pub fn timeout(op: &'static str, after: Duration) -> Self {
        Self::Timeout { op, after }
    }

    /// Create a transport error
    #[inline]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Whether the channel no longer accepts work (draining or closed)
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Draining | Self::Closed)
    }

    /// Whether a later attempt may succeed
    #[inline]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Full | Self::Timeout { .. } | Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChannelError::timeout("enqueue", Duration::from_millis(250));
        assert!(err.to_string().contains("enqueue timed out"));
        assert!(err.to_string().contains("250ms"));

        let err = ChannelError::UnknownDelivery(DeliveryToken::new(4, 9));
        assert!(err.to_string().contains("msg:4/9"));

        let err = ChannelError::transport("broker unreachable");
        assert!(err.to_string().contains("broker unreachable"));
    }

    #[test]
    fn test_classification() {
        assert!(ChannelError::Full.is_retriable());
        assert!(ChannelError::timeout("dequeue", Duration::from_secs(1)).is_retriable());
        assert!(!ChannelError::Closed.is_retriable());

        assert!(ChannelError::Closed.is_closed());
        assert!(ChannelError::Draining.is_closed());
        assert!(!ChannelError::Full.is_closed());
    }
}
