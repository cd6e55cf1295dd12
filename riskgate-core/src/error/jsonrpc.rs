//! JSON-RPC 2.0 error response structures.
//!
//! The gateway synthesizes these when it answers a client itself instead of
//! relaying a downstream response: blocked requests, unparseable lines and
//! downstream failures.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::jsonrpc::JsonRpcId;

/// Invalid JSON was received.
pub const PARSE_ERROR: i32 = -32700;
/// The JSON sent is not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;
/// Internal JSON-RPC error. Also used for policy blocks.
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A complete JSON-RPC error response addressed to one request.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcErrorResponse {
    pub id: JsonRpcId,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    /// Response for a request refused by risk policy.
    ///
    /// The id is always `null`: the blocked response does not echo the
    /// request id, and `reason` travels in `data` as a plain string.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            id: JsonRpcId::Null,
            error: JsonRpcError {
                code: INTERNAL_ERROR,
                message: "Internal error".to_string(),
                data: Some(Value::String(reason.into())),
            },
        }
    }

    /// Response for a line that could not be parsed as JSON-RPC.
    pub fn parse_error(id: JsonRpcId, detail: impl Into<String>) -> Self {
        Self {
            id,
            error: JsonRpcError {
                code: PARSE_ERROR,
                message: "Parse error".to_string(),
                data: Some(Value::String(detail.into())),
            },
        }
    }

    /// Response for a downstream failure that produced no usable body.
    pub fn internal(id: JsonRpcId, detail: impl Into<String>) -> Self {
        Self {
            id,
            error: JsonRpcError {
                code: INTERNAL_ERROR,
                message: "Internal error".to_string(),
                data: Some(Value::String(detail.into())),
            },
        }
    }

    /// Response as a JSON value, field order `jsonrpc`, `id`, `error`.
    pub fn to_value(&self) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": Value::from(&self.id),
            "error": self.error,
        })
    }

    /// Single-line wire form, without the trailing newline.
    pub fn to_line(&self) -> String {
        self.to_value().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_response_wire_format() {
        let line = JsonRpcErrorResponse::blocked("blocked by rule method:delete").to_line();
        assert_eq!(
            line,
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error","data":"blocked by rule method:delete"}}"#
        );
    }

    #[test]
    fn test_parse_error_echoes_id() {
        let value =
            JsonRpcErrorResponse::parse_error(JsonRpcId::String("x".into()), "bad").to_value();
        assert_eq!(value["id"], "x");
        assert_eq!(value["error"]["code"], PARSE_ERROR);
    }

    #[test]
    fn test_error_without_data() {
        let error = JsonRpcError {
            code: INVALID_REQUEST,
            message: "Invalid Request".to_string(),
            data: None,
        };
        let json = serde_json::to_string(&error).unwrap();
        assert!(!json.contains("\"data\""));
    }
}
