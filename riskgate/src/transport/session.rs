//! Client-side mediation shared by the stdio and HTTP transports.
//!
//! One [`Session`] per client connection. It turns each raw client line into
//! a [`Step`]: forward it downstream, answer the client directly, or drop
//! it. Lines are handled strictly in arrival order.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use riskgate_core::error::JsonRpcErrorResponse;
use riskgate_core::jsonrpc::JsonRpcMessageKind;
use riskgate_core::request::client_name_from_initialize;
use riskgate_core::{ProxyRequest, RiskAwareMediator, TransportMode};

use super::ndjson::{id_hint, parse_message};

/// What to do with one client line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Send this line downstream.
    Forward(String),
    /// Write this line back to the client instead.
    Reply(String),
    /// Nothing to send anywhere.
    Drop,
}

/// Per-connection mediation state.
pub struct Session {
    mediator: Arc<RiskAwareMediator>,
    cancel: CancellationToken,
    mode: TransportMode,
    /// From the client's `initialize` request.
    client_name: Option<String>,
}

impl Session {
    pub fn new(
        mediator: Arc<RiskAwareMediator>,
        cancel: CancellationToken,
        mode: TransportMode,
    ) -> Self {
        Self {
            mediator,
            cancel,
            mode,
            client_name: None,
        }
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Mediate one client line.
    ///
    /// Requests and notifications go through the mediator. Responses to
    /// server-initiated requests pass through unmediated.
    pub async fn handle_line(&mut self, line: &str) -> Step {
        let message = match parse_message(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "unparseable client message");
                return match id_hint(line) {
                    Some(id) => Step::Reply(JsonRpcErrorResponse::parse_error(id, e.to_string()).to_line()),
                    None => Step::Drop,
                };
            }
        };

        let (method, id) = match &message.kind {
            JsonRpcMessageKind::Response { .. } => return Step::Forward(message.raw),
            JsonRpcMessageKind::Request { id, method } => (method.as_str(), Some(id.clone())),
            JsonRpcMessageKind::Notification { method } => (method.as_str(), None),
        };

        if method == "initialize" {
            if let Some(name) = client_name_from_initialize(&message.value) {
                info!(client = %name, "client identified");
                self.client_name = Some(name);
            }
        }

        let is_request = id.is_some();
        let request = ProxyRequest::from_message(
            method,
            id,
            &message.value,
            self.client_name.clone().unwrap_or_default(),
            self.mode,
        );

        match self.mediator.audit_request(&request, &self.cancel).await {
            Ok(()) => {
                debug!(method = %request.method, "forwarding");
                Step::Forward(message.raw)
            }
            Err(blocked) if is_request => Step::Reply(blocked.to_response().to_line()),
            Err(_) => {
                debug!(method = %request.method, "blocked notification dropped");
                Step::Drop
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("client_name", &self.client_name)
            .finish_non_exhaustive()
    }
}
