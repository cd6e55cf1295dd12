//! Error types shared across the gateway.
//!
//! Component errors live next to their components (`ConfigError`,
//! `AuditError`, `StoreError`, `ApprovalError`, ...). This module holds the
//! mediation outcome surfaced to transports and the JSON-RPC wire errors.

pub mod jsonrpc;

pub use jsonrpc::{JsonRpcError, JsonRpcErrorResponse};

/// A request that must not be forwarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediationError {
    /// Risk policy refused the request, either directly or after a denied,
    /// expired, cancelled or failed approval.
    #[error("request blocked: {reason}")]
    Blocked { reason: String },
}

impl MediationError {
    /// Reason suitable for the client-facing error `data`.
    pub fn reason(&self) -> &str {
        match self {
            Self::Blocked { reason } => reason,
        }
    }

    /// JSON-RPC error response for this refusal.
    pub fn to_response(&self) -> JsonRpcErrorResponse {
        JsonRpcErrorResponse::blocked(self.to_string())
    }
}
