//! Human approval of risky requests.
//!
//! ## Architecture
//!
//! ```text
//!   mediator ──request_approval──▶ ApprovalManager ──create_pending──▶ ApprovalStore
//!                                       │                                   ▲
//!                                       │ send_approval_request             │ update_response
//!                                       ▼                                   │
//!                                  ApprovalNotifier ──Block Kit──▶ Slack ──▶ CallbackServer
//! ```
//!
//! The manager never holds a reference to a pending approval. It keeps the id
//! and the receiving half of a one-shot signal; the callback path mutates the
//! entry through the store lock, which also fires the signal.
//!
//! ## Module Organization
//!
//! - `mod.rs` - Shared types and the notifier trait
//! - `store.rs` - In-memory registry of pending approvals
//! - `manager.rs` - One request's approval lifecycle
//! - `slack.rs` - Slack notifier
//! - `signature.rs` - Slack request signing
//! - `callback.rs` - Interaction webhook receiver
//! - `mock.rs` - In-process notifier for tests and local runs

pub mod callback;
pub mod manager;
pub mod mock;
pub mod signature;
pub mod slack;
pub mod store;

pub use callback::{CallbackServer, CallbackState, router};
pub use manager::{ApprovalError, ApprovalManager, ApprovalOutcome};
pub use mock::MockNotifier;
pub use signature::{SignatureError, SignatureVerifier};
pub use slack::SlackNotifier;
pub use store::{ApprovalStore, PendingApproval, StoreError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::audit::AuditRecord;
use crate::risk::RiskVerdict;

// ============================================================================
// Approval Request / Response
// ============================================================================

/// What a human is asked to approve.
#[derive(Clone)]
pub struct ApprovalRequest {
    /// Unique per risky request; carried by the approve/deny buttons.
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub method: String,
    pub client_name: String,
    pub verdict: RiskVerdict,
    /// SECURITY: Redacted in Debug output
    pub params: Map<String, Value>,
}

impl ApprovalRequest {
    /// Build the presentable request for an audit record.
    pub fn from_record(id: impl Into<String>, record: &AuditRecord) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            method: record.request.method.clone(),
            client_name: record.request.client_name.clone(),
            verdict: record.verdict.clone(),
            params: record.request.params.clone(),
        }
    }

    /// Client name for display, never empty.
    pub fn client_label(&self) -> &str {
        if self.client_name.is_empty() {
            "unknown client"
        } else {
            &self.client_name
        }
    }
}

impl std::fmt::Debug for ApprovalRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalRequest")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("method", &self.method)
            .field("client_name", &self.client_name)
            .field("verdict", &self.verdict)
            .field("params", &"[REDACTED]")
            .finish()
    }
}

/// A human decision. Immutable once attached to a pending approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
    pub responder: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ApprovalResponse {
    pub fn new(approved: bool, responder: impl Into<String>) -> Self {
        Self {
            approved,
            responder: responder.into(),
            timestamp: Utc::now(),
            comment: None,
        }
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Where a notification was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRef {
    /// Links the outbound message to its callback (Slack message `ts`).
    pub correlation_id: String,
    /// Channel the message landed in (a DM channel for direct messages).
    pub channel: String,
}

// ============================================================================
// Notifier Errors
// ============================================================================

/// Errors from approval notifiers.
#[derive(Debug, Error, Clone)]
pub enum NotifierError {
    /// The message could not be delivered.
    #[error("failed to deliver approval request: {reason}")]
    Delivery {
        reason: String,
        /// Whether the operation can be retried
        retriable: bool,
    },

    /// Rate limited by external API
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Invalid or expired authentication token
    #[error("invalid or expired authentication token")]
    InvalidToken,

    #[error("channel not found: {channel}")]
    ChannelNotFound { channel: String },

    #[error("user not found: {user}")]
    UserNotFound { user: String },

    /// Message not found (may have been deleted)
    #[error("message not found: {ts}")]
    MessageNotFound { ts: String },
}

impl NotifierError {
    /// Returns whether this error is retriable.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Delivery { retriable, .. } => *retriable,
            Self::RateLimited { .. } => true,
            Self::InvalidToken
            | Self::ChannelNotFound { .. }
            | Self::UserNotFound { .. }
            | Self::MessageNotFound { .. } => false,
        }
    }
}

// ============================================================================
// Notifier Trait
// ============================================================================

/// Channel that puts approval requests in front of a human.
///
/// Decisions do not come back through this trait: they arrive on the
/// callback receiver and are written into the [`ApprovalStore`].
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    /// Deliver an approval request with approve/deny actions.
    async fn send_approval_request(
        &self,
        request: &ApprovalRequest,
    ) -> Result<NotificationRef, NotifierError>;

    /// Replace a delivered message with an "expired" notice (best-effort).
    async fn mark_expired(
        &self,
        notification: &NotificationRef,
        request: &ApprovalRequest,
    ) -> Result<(), NotifierError>;

    /// Returns the notifier name for logging.
    fn name(&self) -> &'static str;
}
