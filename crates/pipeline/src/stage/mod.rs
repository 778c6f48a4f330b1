//! Pipeline stages
//!
//! ```text
//! [Generator] --UsageDetail--> [A] --> [Transformer x N] --UsageCostDetail--> [B] --> [Logger]
//! ```
//!
//! Consumers share one loop (`run_consumer`): dequeue, handle, then settle the
//! delivery. Settling is where the error class is acted upon:
//!
//! | Outcome | Action |
//! |---------|--------|
//! | success | ack |
//! | `Validation` | dead letter, ack |
//! | `TransientIo`, retries left | nack with backoff |
//! | `TransientIo`, retries exhausted | dead letter, ack |
//! | `ChannelClosed` | worker exits, message left in the channel |
//!
//! A dead letter that cannot be written leaves the message unacknowledged.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tally_channel::{ChannelError, DeliveryToken, Queue};
use tally_sinks::{DeadLetter, DeadLetterStore};
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorClass, StageError};
use crate::health::{HealthMonitor, HealthState};
use crate::metrics::StageMetrics;
use crate::retry::RetryPolicy;

mod generator;
mod logger;
mod transformer;

pub(crate) use generator::GeneratorStage;
pub(crate) use logger::SinkHandler;
pub(crate) use transformer::TransformHandler;


/// Stage identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Generator,
    Transformer,
    Logger,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generator => "generator",
            Self::Transformer => "transformer",
            Self::Logger => "logger",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a worker does after settling a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Per-message work of a consumer stage
#[async_trait]
pub(crate) trait Handler<T>: Send + Sync {
    async fn handle(&self, payload: &T) -> Result<(), StageError>;
}

/// Everything a stage shares across its workers
#[derive(Clone)]
pub(crate) struct StageContext {
    pub kind: StageKind,
    pub metrics: Arc<StageMetrics>,
    pub health: Arc<HealthMonitor>,
    pub retry: RetryPolicy,
    pub dead_letters: Arc<dyn DeadLetterStore>,
    /// Cancelled when the stage overran its shutdown grace period
    pub hard_stop: CancellationToken,
}

impl StageContext {
    /// Store a dead letter, returning whether it was written
    pub async fn dead_letter(&self, letter: DeadLetter) -> bool {
        let attempts = letter.attempts;
        match self.dead_letters.put(letter).await {
            Ok(id) => {
                self.metrics.record_dead_lettered();
                tracing::warn!(
                    stage = %self.kind,
                    dead_letter_id = id,
                    attempts,
                    store = self.dead_letters.name(),
                    "message dead-lettered"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    stage = %self.kind,
                    error = %e,
                    store = self.dead_letters.name(),
                    "dead-letter write failed, message kept for retry"
                );
                false
            }
        }
    }

    pub fn ack<T: Send + 'static>(&self, queue: &dyn Queue<T>, token: DeliveryToken) {
        if let Err(e) = queue.ack(token) {
            // Lease lost: the message will be delivered again
            tracing::warn!(
                stage = %self.kind,
                channel = queue.name(),
                %token,
                error = %e,
                "ack failed, message may be processed twice"
            );
        }
    }

    pub fn nack<T: Send + 'static>(&self, queue: &dyn Queue<T>, token: DeliveryToken, delay: Duration) {
        if let Err(e) = queue.nack(token, delay) {
            tracing::warn!(
                stage = %self.kind,
                channel = queue.name(),
                %token,
                error = %e,
                "nack failed, message returns after visibility timeout"
            );
        }
    }

    /// Dead-letter then ack, or keep the message if the dead letter failed
    async fn give_up<T: Send + 'static>(
        &self,
        queue: &dyn Queue<T>,
        token: DeliveryToken,
        letter: DeadLetter,
    ) {
        let attempt = letter.attempts.max(1);
        if self.dead_letter(letter).await {
            self.ack(queue, token);
        } else {
            self.nack(queue, token, self.retry.backoff(attempt));
        }
    }

    /// Settle a delivery whose handling failed
    pub async fn on_failure<T>(
        &self,
        queue: &dyn Queue<T>,
        token: DeliveryToken,
        attempt: u32,
        payload: &T,
        err: StageError,
    ) -> Flow
    where
        T: Serialize + Send + 'static,
    {
        self.metrics.record_failed();

        match err.class() {
            ErrorClass::ChannelClosed => {
                tracing::info!(
                    stage = %self.kind,
                    %token,
                    error = %err,
                    "downstream channel closed, worker exiting"
                );
                return Flow::Stop;
            }
            ErrorClass::TransientIo => {
                self.health.record_failure();
                if self.retry.allows(attempt) {
                    let delay = self.retry.backoff(attempt);
                    self.metrics.record_retried();
                    tracing::warn!(
                        stage = %self.kind,
                        %token,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %err,
                        "message failed, retrying"
                    );
                    self.nack(queue, token, delay);
                    return Flow::Continue;
                }
            }
            ErrorClass::Validation => {}
        }

        tracing::warn!(
            stage = %self.kind,
            %token,
            attempt,
            class = %err.class(),
            error = %err,
            "message failed, giving up"
        );
        let letter = DeadLetter::for_record(
            self.kind.as_str(),
            payload,
            err.message(),
            err.class().as_str(),
            attempt,
        );
        self.give_up(queue, token, letter).await;
        Flow::Continue
    }

    /// React to a dequeue that produced no message
    pub async fn on_dequeue_error<T: Send + 'static>(
        &self,
        queue: &dyn Queue<T>,
        err: ChannelError,
    ) -> Flow {
        match err {
            ChannelError::Timeout { .. } => Flow::Continue,
            ChannelError::Closed | ChannelError::Draining => {
                tracing::debug!(stage = %self.kind, channel = queue.name(), "input channel closed");
                Flow::Stop
            }
            ChannelError::Malformed {
                token,
                attempt,
                raw,
                reason,
            } => {
                self.metrics.record_received();
                self.metrics.record_failed();
                tracing::warn!(
                    stage = %self.kind,
                    %token,
                    attempt,
                    bytes = raw.len(),
                    error = %reason,
                    "malformed message"
                );
                let letter = DeadLetter::for_raw(
                    self.kind.as_str(),
                    &raw,
                    reason,
                    ErrorClass::Validation.as_str(),
                    attempt,
                );
                self.give_up(queue, token, letter).await;
                Flow::Continue
            }
            other => {
                tracing::warn!(
                    stage = %self.kind,
                    channel = queue.name(),
                    error = %other,
                    "dequeue failed"
                );
                tokio::select! {
                    _ = self.hard_stop.cancelled() => Flow::Stop,
                    _ = tokio::time::sleep(self.retry.initial_backoff) => Flow::Continue,
                }
            }
        }
    }
}

/// Consume `input` until it closes or the stage is hard-stopped
pub(crate) async fn run_consumer<T, H>(
    ctx: StageContext,
    worker: usize,
    input: Arc<dyn Queue<T>>,
    handler: Arc<H>,
) where
    T: Serialize + Send + Sync + 'static,
    H: Handler<T> + ?Sized,
{
    tracing::info!(stage = %ctx.kind, worker, channel = input.name(), "stage worker started");

    loop {
        if let HealthState::Paused(remaining) = ctx.health.poll() {
            tokio::select! {
                _ = ctx.hard_stop.cancelled() => break,
                _ = tokio::time::sleep(remaining) => continue,
            }
        }

        let result = tokio::select! {
            biased;
            _ = ctx.hard_stop.cancelled() => break,
            result = input.dequeue() => result,
        };

        let delivery = match result {
            Ok(delivery) => delivery,
            Err(e) => match ctx.on_dequeue_error(&*input, e).await {
                Flow::Continue => continue,
                Flow::Stop => break,
            },
        };

        ctx.metrics.record_received();
        let token = delivery.token();
        let attempt = delivery.attempt();
        tracing::debug!(stage = %ctx.kind, worker, %token, attempt, "message received");

        let payload = delivery.into_payload();
        match handler.handle(&payload).await {
            Ok(()) => {
                ctx.ack(&*input, token);
                ctx.metrics.record_processed();
                ctx.health.record_success();
                tracing::debug!(stage = %ctx.kind, worker, %token, "message processed");
            }
            Err(err) => {
                if ctx.on_failure(&*input, token, attempt, &payload, err).await == Flow::Stop {
                    break;
                }
            }
        }
    }

    tracing::info!(stage = %ctx.kind, worker, "stage worker stopped");
}
