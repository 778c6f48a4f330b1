//! Line formats for cost records

use tally_protocol::UsageCostDetail;

use crate::SinkError;

/// How a record is rendered as one line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordFormat {
    /// `userId=user1 callCost=5.0 dataCost=2.0`
    #[default]
    Text,
    /// `{"userId":"user1","callCost":5.0,"dataCost":2.0}`
    Json,
}

impl RecordFormat {
    /// Render a record without a trailing newline
    pub fn render(&self, record: &UsageCostDetail) -> Result<String, SinkError> {
        match self {
            Self::Text => Ok(record.to_string()),
            Self::Json => Ok(serde_json::to_string(record)?),
        }
    }
}
