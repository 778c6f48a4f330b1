//! Transform error types

use thiserror::Error;

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

/// Errors that can occur during transformation
#[derive(Debug, Error)]
pub enum TransformError {
    /// Input violates the `UsageDetail` contract
    #[error("invalid usage detail for '{user_id}': {reason}")]
    InvalidUsageDetail {
        /// User id as received (may be empty)
        user_id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Transformation logic failed
    #[error("transform failed: {0}")]
    TransformFailed(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TransformError {
    /// Create an invalid input error
    pub fn invalid(user_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUsageDetail {
            user_id: user_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a transform failed error
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::TransformFailed(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether retrying the same input can never succeed
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidUsageDetail { .. })
    }
}
