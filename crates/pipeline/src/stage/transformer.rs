//! Transformer stage
//!
//! Prices a `UsageDetail` and enqueues the result on the costs channel. The
//! usage message is acknowledged by the consumer loop only after that enqueue
//! succeeded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tally_channel::{ChannelError, Queue};
use tally_protocol::{UsageCostDetail, UsageDetail};
use tally_transform::Transformer;

use super::Handler;
use crate::backpressure::BackpressureLog;
use crate::error::StageError;
use crate::metrics::StageMetrics;

pub(crate) struct TransformHandler {
    pub transformer: Arc<dyn Transformer>,
    pub output: Arc<dyn Queue<UsageCostDetail>>,
    pub timeout: Duration,
    pub metrics: Arc<StageMetrics>,
    pub backpressure: BackpressureLog,
}

#[async_trait]
impl Handler<UsageDetail> for TransformHandler {
    async fn handle(&self, detail: &UsageDetail) -> Result<(), StageError> {
        let priced = tokio::time::timeout(self.timeout, self.transformer.transform(detail.clone()))
            .await
            .map_err(|_| {
                StageError::transient(format!("processing timeout after {:?}", self.timeout))
            })?;
        let cost = priced?;

        match self.output.enqueue(cost).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if matches!(e, ChannelError::Full | ChannelError::Timeout { .. }) {
                    self.metrics.record_backpressure();
                    self.backpressure.record(&e);
                }
                Err(e.into())
            }
        }
    }
}
