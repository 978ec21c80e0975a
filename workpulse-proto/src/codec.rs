//! JSON encoding for push frames and REST list bodies.
//!
//! List endpoints answer either with a bare JSON array or with the array
//! wrapped in a reference-preserving envelope:
//!
//! ```json
//! { "$id": "1", "$values": [ { "id": 7, ... } ] }
//! ```
//!
//! [`decode_list`] accepts both shapes and yields the records in order.

use serde::de::DeserializeOwned;

use crate::push::PushFrame;

/// Key under which enveloped list bodies carry their records.
pub const ENVELOPE_VALUES_KEY: &str = "$values";

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// The body is neither a bare array nor a `$values` envelope.
    #[error("invalid list envelope: {0}")]
    Envelope(String),
}

/// Encodes a [`PushFrame`] as a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Json` if the frame cannot be serialized.
pub fn encode_frame(frame: &PushFrame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decodes a [`PushFrame`] from a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Json` if the text is not a valid frame.
pub fn decode_frame(text: &str) -> Result<PushFrame, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Extracts the record array from a list body, unwrapping the envelope
/// when present.
///
/// A `null` body (or a `null` under `$values`) is treated as an empty list.
///
/// # Errors
///
/// Returns `CodecError::Envelope` if the body has another shape.
pub fn unwrap_list(body: serde_json::Value) -> Result<Vec<serde_json::Value>, CodecError> {
    match body {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Object(mut map) => match map.remove(ENVELOPE_VALUES_KEY) {
            Some(serde_json::Value::Array(items)) => Ok(items),
            Some(serde_json::Value::Null) => Ok(Vec::new()),
            Some(other) => Err(CodecError::Envelope(format!(
                "`{ENVELOPE_VALUES_KEY}` is not an array: {other}"
            ))),
            None => Err(CodecError::Envelope(format!(
                "object body without `{ENVELOPE_VALUES_KEY}` key"
            ))),
        },
        other => Err(CodecError::Envelope(format!(
            "expected array or envelope, got {other}"
        ))),
    }
}

/// Decodes a list body of either shape into typed records.
///
/// # Errors
///
/// Returns `CodecError::Envelope` for an unexpected body shape, or
/// `CodecError::Json` if a record does not match `T`.
pub fn decode_list<T: DeserializeOwned>(body: serde_json::Value) -> Result<Vec<T>, CodecError> {
    unwrap_list(body)?
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(CodecError::from))
        .collect()
}
