//! Logger stage
//!
//! Writes each `UsageCostDetail` to the configured `RecordSink`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tally_protocol::UsageCostDetail;
use tally_sinks::RecordSink;

use super::Handler;
use crate::error::StageError;

pub(crate) struct SinkHandler {
    pub sink: Arc<dyn RecordSink>,
    pub timeout: Duration,
}

#[async_trait]
impl Handler<UsageCostDetail> for SinkHandler {
    async fn handle(&self, record: &UsageCostDetail) -> Result<(), StageError> {
        tokio::time::timeout(self.timeout, self.sink.write(record))
            .await
            .map_err(|_| {
                StageError::transient(format!(
                    "{} sink write timed out after {:?}",
                    self.sink.name(),
                    self.timeout
                ))
            })??;
        Ok(())
    }
}
