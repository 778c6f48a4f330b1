//! Memory sink - keeps written records for inspection
//!
//! Used by tests and embedders that want the pipeline output in-process.
//! Failures can be injected to exercise the retry path.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tally_protocol::UsageCostDetail;

use crate::{MetricsSnapshot, RecordSink, SinkError, SinkMetrics};

/// Sink collecting records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<UsageCostDetail>>,
    fail_next: AtomicU32,
    metrics: SinkMetrics,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with a write error
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::Relaxed);
    }

    /// Copy of everything written so far
    pub fn records(&self) -> Vec<UsageCostDetail> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write(&self, record: &UsageCostDetail) -> Result<(), SinkError> {
        if self.take_failure() {
            self.metrics.write_error();
            return Err(SinkError::write("injected failure"));
        }

        self.records.lock().push(record.clone());
        self.metrics.record_written(0);
        Ok(())
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collects_in_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.write(&UsageCostDetail::new("a", 1.0, 2.0)).await.unwrap();
        sink.write(&UsageCostDetail::new("b", 3.0, 4.0)).await.unwrap();

        let users: Vec<_> = sink
            .records()
            .iter()
            .map(|r| r.user_id().to_string())
            .collect();
        assert_eq!(users, ["a", "b"]);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.metrics().records_written, 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let sink = MemorySink::new();
        sink.fail_next(2);

        let record = UsageCostDetail::new("a", 1.0, 2.0);
        assert!(matches!(sink.write(&record).await, Err(SinkError::Write(_))));
        assert!(sink.write(&record).await.is_err());
        assert!(sink.write(&record).await.is_ok());

        let metrics = sink.metrics();
        assert_eq!(metrics.write_errors, 2);
        assert_eq!(metrics.records_written, 1);
        assert_eq!(sink.len(), 1);
    }
}
