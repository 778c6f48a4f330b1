//! Periodic metrics reporter
//!
//! Logs a snapshot of every stage and channel at the configured interval,
//! together with the change since the previous report.
//!
//! # Human format
//!
//! ```text
//! generator   received=30 processed=30 failed=0 retried=0 dead_lettered=0 dropped=0 backpressure=0 (+15)
//! channel usage state=open depth=0 in_flight=1 enqueued=30 acked=29 nacked=0 redelivered=0 rejected=0
//! sink records=29 bytes=1740 errors=0 flushes=0
//! ```

use serde_json::json;
use tally_channel::ChannelSnapshot;
use tally_config::{MetricsConfig, MetricsFormat};
use tally_sinks::MetricsSnapshot;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::metrics::{PipelineMetrics, PipelineSnapshot, StageSnapshot};

/// Reports pipeline metrics until cancelled
pub struct MetricsReporter {
    config: MetricsConfig,
    metrics: PipelineMetrics,
    previous: Option<PipelineSnapshot>,
}

impl MetricsReporter {
    pub fn new(config: MetricsConfig, metrics: PipelineMetrics) -> Self {
        Self {
            config,
            metrics,
            previous: None,
        }
    }

    /// Run until cancellation; spawn this as a task
    pub async fn run(mut self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("metrics reporting disabled");
            return;
        }

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;

        info!(
            interval_secs = self.config.interval.as_secs(),
            format = ?self.config.format,
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => self.report(),
            }
        }
    }

    fn report(&mut self) {
        let current = self.metrics.snapshot();
        let output = match self.config.format {
            MetricsFormat::Human => format_human(&current, self.previous.as_ref()),
            MetricsFormat::Json => format_json(&current, self.previous.as_ref()),
        };
        for line in output.lines() {
            info!("{}", line);
        }
        self.previous = Some(current);
    }
}

fn stage_line(name: &str, stage: &StageSnapshot, previous: Option<&StageSnapshot>) -> String {
    let mut line = format!(
        "{name:<11} received={} processed={} failed={} retried={} dead_lettered={} dropped={} backpressure={}",
        stage.received,
        stage.processed,
        stage.failed,
        stage.retried,
        stage.dead_lettered,
        stage.dropped,
        stage.backpressure,
    );
    if let Some(prev) = previous {
        line.push_str(&format!(" (+{})", stage.diff(prev).processed));
    }
    line
}

fn channel_line(name: &str, channel: &ChannelSnapshot) -> String {
    format!(
        "channel {name} state={} depth={} in_flight={} enqueued={} acked={} nacked={} redelivered={} rejected={}",
        channel.state,
        channel.depth,
        channel.in_flight,
        channel.enqueued,
        channel.acked,
        channel.nacked,
        channel.redelivered,
        channel.rejected,
    )
}

fn sink_line(sink: &MetricsSnapshot) -> String {
    format!(
        "sink records={} bytes={} errors={} flushes={}",
        sink.records_written, sink.bytes_written, sink.write_errors, sink.flush_count,
    )
}

/// One line per stage and per channel, then the sink
pub fn format_human(current: &PipelineSnapshot, previous: Option<&PipelineSnapshot>) -> String {
    [
        stage_line("generator", &current.generator, previous.map(|p| &p.generator)),
        stage_line("transformer", &current.transformer, previous.map(|p| &p.transformer)),
        stage_line("logger", &current.logger, previous.map(|p| &p.logger)),
        channel_line("usage", &current.usage),
        channel_line("costs", &current.costs),
        sink_line(&current.sink),
    ]
    .join("\n")
}

fn stage_json(stage: &StageSnapshot, previous: Option<&StageSnapshot>) -> serde_json::Value {
    json!({
        "received": stage.received,
        "processed": stage.processed,
        "failed": stage.failed,
        "retried": stage.retried,
        "dead_lettered": stage.dead_lettered,
        "dropped": stage.dropped,
        "backpressure": stage.backpressure,
        "processed_delta": previous.map(|p| stage.diff(p).processed),
    })
}

fn channel_json(channel: &ChannelSnapshot) -> serde_json::Value {
    json!({
        "state": channel.state.as_str(),
        "depth": channel.depth,
        "in_flight": channel.in_flight,
        "enqueued": channel.enqueued,
        "dequeued": channel.dequeued,
        "acked": channel.acked,
        "nacked": channel.nacked,
        "redelivered": channel.redelivered,
        "rejected": channel.rejected,
    })
}

/// A single JSON document
pub fn format_json(current: &PipelineSnapshot, previous: Option<&PipelineSnapshot>) -> String {
    json!({
        "stages": {
            "generator": stage_json(&current.generator, previous.map(|p| &p.generator)),
            "transformer": stage_json(&current.transformer, previous.map(|p| &p.transformer)),
            "logger": stage_json(&current.logger, previous.map(|p| &p.logger)),
        },
        "channels": {
            "usage": channel_json(&current.usage),
            "costs": channel_json(&current.costs),
        },
        "sink": {
            "records_written": current.sink.records_written,
            "bytes_written": current.sink.bytes_written,
            "write_errors": current.sink.write_errors,
            "flush_count": current.sink.flush_count,
        },
    })
    .to_string()
}
