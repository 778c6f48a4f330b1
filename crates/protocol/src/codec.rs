//! Versioned wire format
//!
//! Records are encoded as JSON inside an envelope carrying the schema version
//! and the record kind. Decoding checks both before touching the payload.
//! A JSON object without an envelope is decoded directly as the requested
//! record (legacy, version 0).

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;
use crate::usage::{UsageCostDetail, UsageDetail};
use crate::Result;

/// Current envelope schema version
pub const SCHEMA_VERSION: u32 = 1;

/// A record that can travel through the pipeline
pub trait Payload: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Record kind written to the envelope
    const KIND: &'static str;
}

impl Payload for UsageDetail {
    const KIND: &'static str = "usage_detail";
}

impl Payload for UsageCostDetail {
    const KIND: &'static str = "usage_cost_detail";
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    kind: &'a str,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    kind: String,
    payload: Value,
}

/// Encode a record into its enveloped wire form
pub fn encode<T: Payload>(record: &T) -> Result<Bytes> {
    let envelope = EnvelopeRef {
        version: SCHEMA_VERSION,
        kind: T::KIND,
        payload: record,
    };
    Ok(Bytes::from(serde_json::to_vec(&envelope)?))
}

/// Decode a record from its wire form
///
/// # Errors
///
/// - `CodecError::Json` if the bytes are not valid JSON or the payload does
///   not match the record schema
/// - `CodecError::UnsupportedVersion` for an unknown envelope version
/// - `CodecError::KindMismatch` if the envelope carries another record kind
pub fn decode<T: Payload>(bytes: &[u8]) -> Result<T> {
    let value: Value = serde_json::from_slice(bytes)?;

    if !is_envelope(&value) {
        return Ok(serde_json::from_value(value)?);
    }

    let envelope: Envelope = serde_json::from_value(value)?;
    if envelope.version != SCHEMA_VERSION {
        return Err(CodecError::UnsupportedVersion(envelope.version));
    }
    if envelope.kind != T::KIND {
        return Err(CodecError::kind_mismatch(T::KIND, envelope.kind));
    }

    Ok(serde_json::from_value(envelope.payload)?)
}

fn is_envelope(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("version") && obj.contains_key("payload"))
}
