//! Codec error types
//!
//! Errors that can occur when encoding or decoding pipeline records.

use thiserror::Error;

/// Errors that can occur during encode/decode
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload is not valid JSON or does not match the record schema
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope declares a schema version this build does not understand
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(u32),

    /// Envelope carries a different record kind than requested
    #[error("record kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// Kind the caller asked for
        expected: &'static str,
        /// Kind found in the envelope
        found: String,
    },
}

impl CodecError {
    /// Create a kind mismatch error
    #[inline]
    pub fn kind_mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        Self::KindMismatch {
            expected,
            found: found.into(),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
