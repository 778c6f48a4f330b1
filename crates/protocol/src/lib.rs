//! Tally Protocol - Core types that flow through the pipeline
//!
//! This crate provides the records exchanged between pipeline stages:
//! - `UsageDetail` - A raw usage observation (call duration, data volume)
//! - `UsageCostDetail` - The priced form of a `UsageDetail`
//! - `codec` - Versioned JSON wire format for both records
//!
//! # Wire Format
//!
//! Records travel inside a small envelope so the schema can evolve:
//!
//! ```text
//! {"version":1,"kind":"usage_detail","payload":{"userId":"user1","duration":100,"data":200}}
//! ```
//!
//! Bare payloads without the envelope (the format produced by older
//! deployments) are still accepted and treated as version 0.

mod codec;
mod error;
mod usage;

pub use codec::{Payload, SCHEMA_VERSION, decode, encode};
pub use error::CodecError;
pub use usage::{UsageCostDetail, UsageDetail};

// Re-export bytes for convenience
pub use bytes::Bytes;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod usage_test;
