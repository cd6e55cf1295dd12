//! NDJSON message parsing.
//!
//! Pure functions only. The session's read loop calls [`parse_message`] for
//! each line and [`id_hint`] to address a parse-error reply when parsing
//! fails.

use serde_json::Value;

use riskgate_core::jsonrpc::{JsonRpcClassifyError, JsonRpcId, JsonRpcMessageKind, classify_jsonrpc, extract_id};

use crate::error::FramingError;

/// Maximum NDJSON message size (10 MB).
///
/// Lines over this limit are rejected before JSON parsing.
pub const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// A parsed NDJSON line.
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: JsonRpcMessageKind,
    /// The full parsed message, needed for params and `initialize` inspection.
    pub value: Value,
    /// The trimmed line, forwarded byte-for-byte.
    pub raw: String,
}

impl Message {
    pub fn method(&self) -> Option<&str> {
        self.kind.method()
    }

    pub fn id(&self) -> Option<&JsonRpcId> {
        self.kind.id()
    }
}

/// Parse a single NDJSON line.
///
/// # Errors
///
/// Returns [`FramingError`] for:
/// - Oversized messages (`MessageTooLarge`), checked before JSON parsing
/// - Empty lines, invalid JSON, invalid `id` or neither `id` nor `method` (`MalformedJson`)
/// - JSON arrays (`UnsupportedBatch`)
/// - Missing or wrong `jsonrpc` (`MissingVersion`, `UnsupportedVersion`)
pub fn parse_message(line: &str) -> Result<Message, FramingError> {
    if line.len() > MAX_MESSAGE_BYTES {
        return Err(FramingError::MessageTooLarge {
            max_bytes: MAX_MESSAGE_BYTES,
        });
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(FramingError::MalformedJson {
            reason: "empty message".to_string(),
        });
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| FramingError::MalformedJson {
        reason: e.to_string(),
    })?;

    if value.is_array() {
        return Err(FramingError::UnsupportedBatch);
    }

    let kind = classify_jsonrpc(&value).map_err(|e| match e {
        JsonRpcClassifyError::InvalidVersion => match value.get("jsonrpc") {
            Some(Value::String(v)) => FramingError::UnsupportedVersion { version: v.clone() },
            Some(other) => FramingError::UnsupportedVersion {
                version: other.to_string(),
            },
            None => FramingError::MissingVersion,
        },
        other => FramingError::MalformedJson {
            reason: other.to_string(),
        },
    })?;

    Ok(Message {
        kind,
        value,
        raw: trimmed.to_string(),
    })
}

/// The `id` of a line that failed [`parse_message`], if one can be recovered.
///
/// Only lines that are valid JSON objects yield an id. `null` ids are not
/// returned, since a reply addressed to `null` cannot be correlated.
pub fn id_hint(line: &str) -> Option<JsonRpcId> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    match extract_id(&value)? {
        JsonRpcId::Null => None,
        id => Some(id),
    }
}
