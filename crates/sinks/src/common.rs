//! Common types and utilities for sinks
//!
//! Shared functionality across all sink types.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tally_protocol::UsageCostDetail;
use thiserror::Error;

/// Destination for cost records
///
/// `write` must not return before the record is handed to its destination;
/// the logger stage acknowledges the record right after.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Sink name for logs and metrics
    fn name(&self) -> &'static str;

    /// Write one record
    async fn write(&self, record: &UsageCostDetail) -> Result<(), SinkError>;

    /// Flush buffered output
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Counters for this sink
    fn metrics(&self) -> MetricsSnapshot;
}

/// Metrics shared by all sink types
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Records successfully written
    pub records_written: AtomicU64,

    /// Bytes written (rendered lines)
    pub bytes_written: AtomicU64,

    /// Write errors encountered
    pub write_errors: AtomicU64,

    /// Flush operations performed
    pub flush_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            records_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        }
    }

    /// Record a successfully written record
    #[inline]
    pub fn record_written(&self, bytes: u64) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a write error
    #[inline]
    pub fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a flush operation
    #[inline]
    pub fn flush(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of sink metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_written: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
    pub flush_count: u64,
}

/// Common sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink initialization failed
    #[error("failed to initialize sink: {0}")]
    Init(String),

    /// Failed to write data
    #[error("write failed: {0}")]
    Write(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored record could not be read back
    #[error("corrupt record at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number
        line: usize,
        /// Parse failure
        reason: String,
    },
}

impl SinkError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Create a write error
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
