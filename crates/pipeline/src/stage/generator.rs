//! Generator stage
//!
//! Ticks at a fixed delay and enqueues one `UsageDetail` per tick on the usage
//! channel. In `block` mode a detail that could not be enqueued is kept and
//! retried on the following ticks before any new detail is generated; after
//! the retry limit it becomes a dead letter. In `drop` mode a full channel
//! costs the tick.

use std::sync::Arc;
use std::time::Duration;

use tally_channel::{ChannelError, Queue};
use tally_config::BackpressureMode;
use tally_protocol::UsageDetail;
use tally_sinks::DeadLetter;
use tally_sources::UsageGenerator;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::StageContext;
use crate::backpressure::BackpressureLog;
use crate::error::ErrorClass;

/// A detail waiting to be enqueued and how many attempts failed so far
struct Pending {
    detail: UsageDetail,
    failures: u32,
}

pub(crate) struct GeneratorStage {
    pub ctx: StageContext,
    pub generator: Arc<UsageGenerator>,
    pub output: Arc<dyn Queue<UsageDetail>>,
    pub interval: Duration,
    pub mode: BackpressureMode,
    pub backpressure: BackpressureLog,
    /// Stops ticking
    pub shutdown: CancellationToken,
}

impl GeneratorStage {
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            stage = %self.ctx.kind,
            interval_ms = self.interval.as_millis() as u64,
            backpressure = self.mode.as_str(),
            channel = self.output.name(),
            "generator started"
        );

        let mut pending: Option<Pending> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = self.ctx.hard_stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.ctx.health.is_paused() {
                tracing::debug!(stage = %self.ctx.kind, "tick skipped, stage paused");
                continue;
            }

            let next = pending.take().unwrap_or_else(|| {
                self.ctx.metrics.record_received();
                Pending {
                    detail: self.generator.next_detail(),
                    failures: 0,
                }
            });

            let carry_on = match self.mode {
                BackpressureMode::Block => self.enqueue_blocking(next, &mut pending).await,
                BackpressureMode::Drop => self.enqueue_or_drop(next.detail),
            };
            if !carry_on {
                break;
            }
        }

        if let Some(left) = pending {
            self.ctx.metrics.record_dropped();
            tracing::warn!(
                stage = %self.ctx.kind,
                user_id = left.detail.user_id(),
                failures = left.failures,
                "pending usage detail discarded at shutdown"
            );
        }

        tracing::info!(stage = %self.ctx.kind, "generator stopped");
    }

    /// Returns false when the generator must exit
    async fn enqueue_blocking(&self, next: Pending, pending: &mut Option<Pending>) -> bool {
        let Pending { detail, failures } = next;

        let err = match self.output.enqueue(detail.clone()).await {
            Ok(()) => {
                self.on_enqueued(&detail);
                return true;
            }
            Err(e) if e.is_closed() => {
                self.on_closed(&e);
                return false;
            }
            Err(e) => e,
        };

        let attempt = failures + 1;
        self.ctx.metrics.record_failed();
        self.ctx.health.record_failure();
        self.note_backpressure(&err);

        if self.ctx.retry.allows(attempt) {
            self.ctx.metrics.record_retried();
            tracing::warn!(
                stage = %self.ctx.kind,
                user_id = detail.user_id(),
                attempt,
                error = %err,
                "enqueue failed, retrying on next tick"
            );
            *pending = Some(Pending {
                detail,
                failures: attempt,
            });
            return true;
        }

        let letter = DeadLetter::for_record(
            self.ctx.kind.as_str(),
            &detail,
            err.to_string(),
            ErrorClass::TransientIo.as_str(),
            attempt,
        );
        if !self.ctx.dead_letter(letter).await {
            *pending = Some(Pending {
                detail,
                failures: attempt,
            });
        }
        true
    }

    /// Returns false when the generator must exit
    fn enqueue_or_drop(&self, detail: UsageDetail) -> bool {
        match self.output.try_enqueue(detail.clone()) {
            Ok(()) => {
                self.on_enqueued(&detail);
                true
            }
            Err(e) if e.is_closed() => {
                self.on_closed(&e);
                false
            }
            Err(e) => {
                self.ctx.metrics.record_dropped();
                self.note_backpressure(&e);
                tracing::debug!(
                    stage = %self.ctx.kind,
                    user_id = detail.user_id(),
                    error = %e,
                    "usage detail dropped"
                );
                true
            }
        }
    }

    fn on_enqueued(&self, detail: &UsageDetail) {
        self.ctx.metrics.record_processed();
        self.ctx.health.record_success();
        tracing::debug!(
            stage = %self.ctx.kind,
            user_id = detail.user_id(),
            duration = detail.duration(),
            data = detail.data(),
            "usage detail enqueued"
        );
    }

    fn on_closed(&self, err: &ChannelError) {
        tracing::info!(
            stage = %self.ctx.kind,
            channel = self.output.name(),
            error = %err,
            "usage channel no longer accepts messages, generator exiting"
        );
    }

    fn note_backpressure(&self, err: &ChannelError) {
        if matches!(err, ChannelError::Full | ChannelError::Timeout { .. }) {
            self.ctx.metrics.record_backpressure();
            self.backpressure.record(err);
        }
    }
}
