//! The mediated request model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::jsonrpc::JsonRpcId;

/// How the gateway reaches the downstream tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Http,
    Stdio,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Stdio => write!(f, "stdio"),
        }
    }
}

/// One inbound call awaiting mediation.
///
/// Built by a transport per inbound line and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub method: String,

    /// Parameters in their original key order.
    pub params: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<JsonRpcId>,

    /// Client name from the session's `initialize` handshake, empty until seen.
    pub client_name: String,

    pub mode: TransportMode,
}

impl ProxyRequest {
    /// Build a request from a classified message.
    ///
    /// Object params are kept as-is. Positional (array) or scalar params are
    /// kept under a single `params` key so they are still scanned and audited.
    pub fn from_message(
        method: impl Into<String>,
        request_id: Option<JsonRpcId>,
        message: &Value,
        client_name: impl Into<String>,
        mode: TransportMode,
    ) -> Self {
        let params = match message.get("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                let mut map = Map::new();
                map.insert("params".to_string(), other.clone());
                map
            }
        };

        Self {
            method: method.into(),
            params,
            request_id,
            client_name: client_name.into(),
            mode,
        }
    }

    /// Parameters as a JSON object.
    pub fn params_value(&self) -> Value {
        Value::Object(self.params.clone())
    }
}

/// Extract `params.clientInfo.name` from an `initialize` message.
pub fn client_name_from_initialize(message: &Value) -> Option<String> {
    message
        .get("params")?
        .get("clientInfo")?
        .get("name")?
        .as_str()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_message_keeps_param_order() {
        let msg = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"zeta": 1, "alpha": 2}});
        let req = ProxyRequest::from_message(
            "tools/call",
            Some(JsonRpcId::Number(1)),
            &msg,
            "",
            TransportMode::Stdio,
        );
        let keys: Vec<&String> = req.params.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_from_message_wraps_positional_params() {
        let msg = json!({"jsonrpc": "2.0", "method": "exec", "params": ["rm -rf /"]});
        let req = ProxyRequest::from_message("exec", None, &msg, "", TransportMode::Http);
        assert_eq!(req.params["params"], json!(["rm -rf /"]));
    }

    #[test]
    fn test_from_message_missing_params() {
        let msg = json!({"jsonrpc": "2.0", "id": 2, "method": "ping"});
        let req = ProxyRequest::from_message("ping", None, &msg, "", TransportMode::Http);
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_client_name_from_initialize() {
        let msg = json!({"jsonrpc": "2.0", "id": 0, "method": "initialize",
            "params": {"clientInfo": {"name": "claude-desktop", "version": "1.0"}}});
        assert_eq!(
            client_name_from_initialize(&msg),
            Some("claude-desktop".to_string())
        );
        assert_eq!(client_name_from_initialize(&json!({"params": {}})), None);
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_value(TransportMode::Stdio).unwrap(), "stdio");
    }
}
