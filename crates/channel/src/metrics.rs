//! Channel metrics
//!
//! Atomic counters for tracking channel traffic.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::delivery::ChannelState;

/// Counters for a single channel
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    /// Messages accepted by enqueue
    enqueued: AtomicU64,

    /// Deliveries handed to consumers (including redeliveries)
    dequeued: AtomicU64,

    /// Deliveries acknowledged
    acked: AtomicU64,

    /// Deliveries returned by their consumer
    nacked: AtomicU64,

    /// Messages made visible again after the visibility timeout
    redelivered: AtomicU64,

    /// Enqueue attempts refused (full, timed out, draining)
    rejected: AtomicU64,
}

impl ChannelMetrics {
    /// Create new metrics with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            acked: AtomicU64::new(0),
            nacked: AtomicU64::new(0),
            redelivered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dequeued(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_acked(&self) {
        self.acked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_nacked(&self) {
        self.nacked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_redelivered(&self, count: u64) {
        self.redelivered.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    ///
    /// Gauges (`depth`, `in_flight`, `state`) are filled in by the owner.
    pub fn snapshot(&self, state: ChannelState, depth: usize, in_flight: usize) -> ChannelSnapshot {
        ChannelSnapshot {
            state,
            depth,
            in_flight,
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
            redelivered: self.redelivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSnapshot {
    /// Lifecycle state
    pub state: ChannelState,
    /// Messages ready for delivery
    pub depth: usize,
    /// Messages delivered but not yet acknowledged
    pub in_flight: usize,
    /// Messages accepted by enqueue
    pub enqueued: u64,
    /// Deliveries handed out
    pub dequeued: u64,
    /// Deliveries acknowledged
    pub acked: u64,
    /// Deliveries returned by consumers
    pub nacked: u64,
    /// Visibility timeout expirations
    pub redelivered: u64,
    /// Refused enqueue attempts
    pub rejected: u64,
}

impl ChannelSnapshot {
    /// Messages still held by the channel
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.depth + self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = ChannelMetrics::new();
        metrics.record_enqueued();
        metrics.record_enqueued();
        metrics.record_dequeued();
        metrics.record_acked();
        metrics.record_redelivered(3);
        metrics.record_rejected();

        let s = metrics.snapshot(ChannelState::Open, 1, 0);
        assert_eq!(s.enqueued, 2);
        assert_eq!(s.dequeued, 1);
        assert_eq!(s.acked, 1);
        assert_eq!(s.nacked, 0);
        assert_eq!(s.redelivered, 3);
        assert_eq!(s.rejected, 1);
        assert_eq!(s.outstanding(), 1);
    }
}
