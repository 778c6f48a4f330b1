//! Stage metrics
//!
//! Atomic counters for tracking what each stage did with its messages.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tally_channel::{ChannelSnapshot, Queue};
use tally_protocol::{UsageCostDetail, UsageDetail};
use tally_sinks::{MetricsSnapshot, RecordSink};

/// Counters for one stage
///
/// Shared by all workers of the stage.
#[derive(Debug, Default)]
pub struct StageMetrics {
    /// Messages taken in (generated or dequeued, including redeliveries)
    received: AtomicU64,

    /// Messages handed on and acknowledged
    processed: AtomicU64,

    /// Failed attempts of any class
    failed: AtomicU64,

    /// Attempts scheduled again after a transient failure
    retried: AtomicU64,

    /// Messages moved to the dead-letter store
    dead_lettered: AtomicU64,

    /// Messages given up without a dead letter (best-effort mode, shutdown)
    dropped: AtomicU64,

    /// Times the downstream channel was full
    backpressure: AtomicU64,
}

impl StageMetrics {
    /// Create new metrics with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            backpressure: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_backpressure(&self) {
        self.backpressure.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            received: self.received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            backpressure: self.backpressure.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `StageMetrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSnapshot {
    pub received: u64,
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub dropped: u64,
    pub backpressure: u64,
}

impl StageSnapshot {
    /// Counter increase since an earlier snapshot
    ///
    /// Saturates at zero so a reset between the two never underflows.
    pub fn diff(&self, earlier: &Self) -> Self {
        Self {
            received: self.received.saturating_sub(earlier.received),
            processed: self.processed.saturating_sub(earlier.processed),
            failed: self.failed.saturating_sub(earlier.failed),
            retried: self.retried.saturating_sub(earlier.retried),
            dead_lettered: self.dead_lettered.saturating_sub(earlier.dead_lettered),
            dropped: self.dropped.saturating_sub(earlier.dropped),
            backpressure: self.backpressure.saturating_sub(earlier.backpressure),
        }
    }
}

/// Metrics of the whole pipeline at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSnapshot {
    pub generator: StageSnapshot,
    pub transformer: StageSnapshot,
    pub logger: StageSnapshot,
    /// Channel A
    pub usage: ChannelSnapshot,
    /// Channel B
    pub costs: ChannelSnapshot,
    /// Logger's sink
    pub sink: MetricsSnapshot,
}

impl PipelineSnapshot {
    /// Dead letters written by all stages
    pub fn dead_lettered(&self) -> u64 {
        self.generator.dead_lettered + self.transformer.dead_lettered + self.logger.dead_lettered
    }
}

/// Live handles to every counter of a running pipeline
#[derive(Clone)]
pub struct PipelineMetrics {
    pub(crate) generator: Arc<StageMetrics>,
    pub(crate) transformer: Arc<StageMetrics>,
    pub(crate) logger: Arc<StageMetrics>,
    pub(crate) usage: Arc<dyn Queue<UsageDetail>>,
    pub(crate) costs: Arc<dyn Queue<UsageCostDetail>>,
    pub(crate) sink: Arc<dyn RecordSink>,
}

impl PipelineMetrics {
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            generator: self.generator.snapshot(),
            transformer: self.transformer.snapshot(),
            logger: self.logger.snapshot(),
            usage: self.usage.snapshot(),
            costs: self.costs.snapshot(),
            sink: self.sink.metrics(),
        }
    }
}
