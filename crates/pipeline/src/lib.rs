//! Tally - Pipeline
//!
//! The runtime that connects the usage generator, the cost transformer and
//! the usage logger through two at-least-once channels.
//!
//! # Architecture
//!
//! ```text
//! [Generator] --UsageDetail--> [Channel A] --> [Transformer x N] --UsageCostDetail--> [Channel B] --> [Logger] --> [RecordSink]
//!      |                                              |                                                |
//!      +---------------------------(gave up)----------+---------------------> [DeadLetterStore] <-----+
//! ```
//!
//! # Key Design
//!
//! - **Explicit wiring**: `PipelineBuilder` builds every component, or takes
//!   injected ones (any `Queue`, `Transformer`, `RecordSink`, `DeadLetterStore`)
//! - **Ack after hand-off**: a message is acknowledged only once the next
//!   stage owns it, so a crash never loses one
//! - **Classified failures**: `Validation` goes to dead letters at once,
//!   `TransientIo` is retried with backoff first, `ChannelClosed` ends the worker
//! - **Health pauses**: a stage whose error rate crosses the threshold pauses
//!   and broadcasts an `Alert`
//! - **Ordered drain**: shutdown stops the generator, then drains A, then B
//!
//! # Example
//!
//! ```ignore
//! use tally_pipeline::PipelineBuilder;
//!
//! let config = tally_config::Config::load(None)?;
//! let running = PipelineBuilder::from_config(&config).await?.build()?.start();
//!
//! tokio::signal::ctrl_c().await?;
//! let report = running.shutdown().await;
//! ```

mod backpressure;
mod error;
mod health;
mod metrics;
mod reporter;
mod retry;
mod runtime;
mod stage;

pub use backpressure::{BackpressureLog, DEFAULT_SUMMARY_INTERVAL};
pub use error::{ErrorClass, PipelineError, Result, StageError};
pub use health::{Alert, HealthMonitor, HealthPolicy, HealthState};
pub use metrics::{PipelineMetrics, PipelineSnapshot, StageMetrics, StageSnapshot};
pub use reporter::{MetricsReporter, format_human, format_json};
pub use retry::RetryPolicy;
pub use runtime::{Pipeline, PipelineBuilder, RunningPipeline, ShutdownReport};
pub use stage::StageKind;

// Re-export key types from dependencies for convenience
pub use tally_config::BackpressureMode;
