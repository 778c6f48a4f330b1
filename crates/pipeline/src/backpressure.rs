//! Rate-limited backpressure reporting
//!
//! A stalled consumer makes the producer hit a full channel on every attempt.
//! Events are counted every time but logged at most once per interval, with
//! the number of events folded into the summary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Default summary interval
pub const DEFAULT_SUMMARY_INTERVAL: Duration = Duration::from_secs(1);

/// Aggregates backpressure events into periodic warnings
#[derive(Debug)]
pub struct BackpressureLog {
    stage: &'static str,
    channel: String,
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,
    pending: AtomicU64,
    total: AtomicU64,
}

impl BackpressureLog {
    pub fn new(stage: &'static str, channel: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            stage,
            channel: channel.into(),
            min_interval,
            last_log_time: Mutex::new(None),
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Record one event, logging if the interval has passed
    ///
    /// Returns true if a summary was logged.
    pub fn record(&self, reason: &dyn std::fmt::Display) -> bool {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);

        let should_log = {
            let mut last = self.last_log_time.lock();
            let now = Instant::now();
            match *last {
                Some(at) if now.duration_since(at) < self.min_interval => false,
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };
        if !should_log {
            return false;
        }

        let events = self.pending.swap(0, Ordering::Relaxed);
        tracing::warn!(
            stage = self.stage,
            channel = %self.channel,
            events,
            total = self.total.load(Ordering::Relaxed),
            reason = %reason,
            "backpressure: downstream channel full"
        );
        true
    }

    /// Events not yet included in a summary
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Events ever recorded
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
