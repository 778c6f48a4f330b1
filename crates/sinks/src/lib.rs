//! Tally - Sinks
//!
//! Destinations for priced usage records, and the dead-letter stores that
//! keep messages a stage gave up on.
//!
//! # Architecture
//!
//! The logger stage dequeues a `UsageCostDetail`, hands it to a `RecordSink`,
//! and acknowledges the message only once `write` returned `Ok`.
//!
//! ```text
//! [Channel B] --UsageCostDetail--> [Logger Stage] --> [RecordSink] --> [Destination]
//!                                        |
//!                                        +--(gave up)--> [DeadLetterStore]
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Purpose |
//! |------|---------|
//! | `log` | Structured `tracing` event per record (default) |
//! | `stdout` | Human-readable output, optionally coloured |
//! | `file` | Append one line per record |
//! | `memory` | Collect records in-process (tests, embedding) |
//!
//! # Example
//!
//! ```ignore
//! use tally_sinks::{RecordFormat, FileSink, RecordSink};
//!
//! let sink = FileSink::open("costs.log", RecordFormat::Text).await?;
//! sink.write(&record).await?;
//! ```

mod common;
mod format;

/// Log sink - one tracing event per record
pub mod log;

/// Stdout sink - human-readable output
pub mod stdout;

/// File sink - append-only lines
pub mod file;

/// Memory sink - in-process collection
pub mod memory;

/// Dead-letter stores
pub mod dead_letter;

pub use common::{MetricsSnapshot, RecordSink, SinkError, SinkMetrics};
pub use dead_letter::{DeadLetter, DeadLetterStore, FileDeadLetterStore, MemoryDeadLetterStore};
pub use file::FileSink;
pub use format::RecordFormat;
pub use log::{LogSink, USAGE_COST_TARGET};
pub use memory::MemorySink;
pub use stdout::{StdoutConfig, StdoutSink};
