//! Dead-letter stores
//!
//! Messages a stage gives up on are written here with enough context to be
//! inspected and replayed by hand: the stage, the original payload, the
//! failure reason and class, and how many attempts were made.
//!
//! # Destinations
//!
//! | Store | Identifier | Inspect with |
//! |-------|------------|--------------|
//! | `MemoryDeadLetterStore` | `memory` | `list()` in-process |
//! | `FileDeadLetterStore` | `file:<path>` | `tally dead-letters --path <path>` |
//!
//! A failed `put` must leave the message unacknowledged so it is retried.

mod file;
mod memory;

pub use file::{FileDeadLetterStore, read_all};
pub use memory::MemoryDeadLetterStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SinkError;

#[cfg(test)]
mod dead_letter_test;

/// A message that could not be processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Store-assigned sequence number (0 until stored)
    pub id: u64,

    /// Stage that gave up (`generator`, `transformer`, `logger`)
    pub stage: String,

    /// Original message, or its raw text when it was not valid JSON
    pub payload: Value,

    /// Last failure
    pub reason: String,

    /// Error class of the last failure
    pub class: String,

    /// Processing attempts made, including the first
    pub attempts: u32,

    pub timestamp: DateTime<Utc>,
}

impl DeadLetter {
    /// Create a dead letter stamped with the current time
    pub fn new(
        stage: impl Into<String>,
        payload: Value,
        reason: impl Into<String>,
        class: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            id: 0,
            stage: stage.into(),
            payload,
            reason: reason.into(),
            class: class.into(),
            attempts,
            timestamp: Utc::now(),
        }
    }

    /// Create a dead letter for a typed record
    pub fn for_record<T: Serialize>(
        stage: impl Into<String>,
        record: &T,
        reason: impl Into<String>,
        class: impl Into<String>,
        attempts: u32,
    ) -> Self {
        let payload = serde_json::to_value(record).unwrap_or(Value::Null);
        Self::new(stage, payload, reason, class, attempts)
    }

    /// Create a dead letter for bytes that could not be decoded
    ///
    /// JSON input is kept as structured JSON, anything else as lossy text.
    pub fn for_raw(
        stage: impl Into<String>,
        raw: &[u8],
        reason: impl Into<String>,
        class: impl Into<String>,
        attempts: u32,
    ) -> Self {
        let payload = serde_json::from_slice(raw)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()));
        Self::new(stage, payload, reason, class, attempts)
    }
}

/// Destination for dead letters
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Store name for logs
    fn name(&self) -> &'static str;

    /// Persist a dead letter, returning its assigned id
    async fn put(&self, letter: DeadLetter) -> Result<u64, SinkError>;

    /// All dead letters in insertion order
    async fn list(&self) -> Result<Vec<DeadLetter>, SinkError>;

    /// Number of dead letters stored by this instance
    fn count(&self) -> u64;
}
