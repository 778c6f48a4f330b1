//! Log Sink - cost records as structured tracing events
//!
//! Every record becomes one `info` event on target `tally::usage_cost`
//! carrying the three fields, with the text form as the message.

use async_trait::async_trait;
use tally_protocol::UsageCostDetail;

use crate::{MetricsSnapshot, RecordSink, SinkError, SinkMetrics};

/// Tracing target of cost record events
pub const USAGE_COST_TARGET: &str = "tally::usage_cost";

/// Sink emitting one tracing event per record
#[derive(Debug, Default)]
pub struct LogSink {
    metrics: SinkMetrics,
}

impl LogSink {
    /// Create a log sink
    pub const fn new() -> Self {
        Self {
            metrics: SinkMetrics::new(),
        }
    }
}

#[async_trait]
impl RecordSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn write(&self, record: &UsageCostDetail) -> Result<(), SinkError> {
        let line = record.to_string();
        tracing::info!(
            target: USAGE_COST_TARGET,
            user_id = %record.user_id(),
            call_cost = record.call_cost(),
            data_cost = record.data_cost(),
            "{line}"
        );
        self.metrics.record_written(line.len() as u64);
        Ok(())
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
