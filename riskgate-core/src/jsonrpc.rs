//! Transport-agnostic JSON-RPC 2.0 message classification.
//!
//! Both transports parse a line into a `serde_json::Value` and classify it
//! here before deciding whether it needs mediation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// JSON-RPC 2.0 request ID.
///
/// The type of the ID is preserved: a client sending `"id": 1` gets `"id": 1`
/// back, never `"id": "1"`. An explicit `null` is distinct from a missing
/// `id` (a notification).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JsonRpcId {
    /// Integer ID (e.g., `"id": 1`)
    Number(i64),
    /// String ID (e.g., `"id": "abc-123"`)
    String(String),
    /// Explicit null ID
    Null,
}

impl Serialize for JsonRpcId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonRpcId::Number(n) => serializer.serialize_i64(*n),
            JsonRpcId::String(s) => serializer.serialize_str(s),
            JsonRpcId::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for JsonRpcId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_id(&value).map_err(|_| {
            serde::de::Error::custom("JSON-RPC ID must be string, integer, or null")
        })
    }
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::Number(n) => write!(f, "{n}"),
            JsonRpcId::String(s) => write!(f, "{s}"),
            JsonRpcId::Null => write!(f, "null"),
        }
    }
}

impl From<&JsonRpcId> for Value {
    fn from(id: &JsonRpcId) -> Self {
        match id {
            JsonRpcId::Number(n) => Value::from(*n),
            JsonRpcId::String(s) => Value::from(s.as_str()),
            JsonRpcId::Null => Value::Null,
        }
    }
}

/// Message kind, determined by presence/absence of `id` and `method`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonRpcMessageKind {
    /// Has both `id` and `method`.
    Request { id: JsonRpcId, method: String },
    /// Has `id` but no `method`.
    Response { id: JsonRpcId },
    /// Has `method` but no `id`.
    Notification { method: String },
}

impl JsonRpcMessageKind {
    /// Method name for requests and notifications.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method } => Some(method),
            Self::Response { .. } => None,
        }
    }

    /// Request ID, if the message carries one.
    pub fn id(&self) -> Option<&JsonRpcId> {
        match self {
            Self::Request { id, .. } | Self::Response { id } => Some(id),
            Self::Notification { .. } => None,
        }
    }
}

/// Classify a parsed JSON-RPC value without taking ownership.
///
/// # Errors
///
/// - `InvalidVersion` when `jsonrpc` is missing or not `"2.0"`
/// - `InvalidId` when `id` is present but not a string, integer or null
/// - `Unclassifiable` when neither `id` nor `method` is present
pub fn classify_jsonrpc(value: &Value) -> Result<JsonRpcMessageKind, JsonRpcClassifyError> {
    let version = value.get("jsonrpc").and_then(|v| v.as_str());
    if version != Some("2.0") {
        return Err(JsonRpcClassifyError::InvalidVersion);
    }

    let id = value
        .get("id")
        .map(parse_id)
        .transpose()
        .map_err(|_| JsonRpcClassifyError::InvalidId)?;
    let method = value
        .get("method")
        .and_then(|v| v.as_str())
        .map(String::from);

    match (id, method) {
        (Some(id), Some(method)) => Ok(JsonRpcMessageKind::Request { id, method }),
        (Some(id), None) => Ok(JsonRpcMessageKind::Response { id }),
        (None, Some(method)) => Ok(JsonRpcMessageKind::Notification { method }),
        (None, None) => Err(JsonRpcClassifyError::Unclassifiable),
    }
}

/// Best-effort ID extraction from a message that failed classification.
///
/// Used to address parse-error responses; returns `None` when the value has
/// no usable `id`.
pub fn extract_id(value: &Value) -> Option<JsonRpcId> {
    value.get("id").and_then(|v| parse_id(v).ok())
}

fn parse_id(value: &Value) -> Result<JsonRpcId, ()> {
    match value {
        Value::Number(n) => n.as_i64().map(JsonRpcId::Number).ok_or(()),
        Value::String(s) => Ok(JsonRpcId::String(s.clone())),
        Value::Null => Ok(JsonRpcId::Null),
        _ => Err(()),
    }
}

/// Errors that can occur during JSON-RPC message classification.
#[derive(Debug, thiserror::Error)]
pub enum JsonRpcClassifyError {
    /// The `jsonrpc` field is missing or not `"2.0"`.
    #[error("missing or invalid jsonrpc version field")]
    InvalidVersion,
    /// The `id` field is present but not a valid JSON-RPC ID.
    #[error("invalid id field")]
    InvalidId,
    /// The message has neither `id` nor `method`.
    #[error("message has neither id nor method")]
    Unclassifiable,
}
