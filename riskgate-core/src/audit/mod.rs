//! Append-only audit trail of mediated requests.
//!
//! One [`AuditRecord`] is written per mediated request, blocked or not. A
//! record is fully composed before the single append call, so a sink never
//! holds a partial record.

mod jsonl;
mod noop;

pub use jsonl::JsonlAuditLog;
pub use noop::NoopAuditLog;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::approval::ApprovalResponse;
use crate::request::ProxyRequest;
use crate::risk::RiskVerdict;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How an approval wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    Denied,
    TimedOut,
    Cancelled,
    /// Notification delivery or store failure before a decision arrived.
    Failed,
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub request: ProxyRequest,

    #[serde(flatten)]
    pub verdict: RiskVerdict,

    pub blocked: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,

    pub approval_requested: bool,
    pub approved: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_outcome: Option<ApprovalStatus>,
}

impl AuditRecord {
    /// A record for a request that has been classified but not yet decided.
    pub fn new(request: ProxyRequest, verdict: RiskVerdict) -> Self {
        Self {
            timestamp: Utc::now(),
            request,
            verdict,
            blocked: false,
            block_reason: None,
            approval_requested: false,
            approved: false,
            approved_by: None,
            approved_at: None,
            approval_outcome: None,
        }
    }

    /// Mark the request as refused.
    #[must_use]
    pub fn blocked(mut self, reason: impl Into<String>) -> Self {
        self.blocked = true;
        self.block_reason = Some(reason.into());
        self
    }

    /// Record the end of an approval wait.
    #[must_use]
    pub fn with_approval(
        mut self,
        status: ApprovalStatus,
        response: Option<&ApprovalResponse>,
    ) -> Self {
        self.approval_requested = true;
        self.approval_outcome = Some(status);
        self.approved = status == ApprovalStatus::Approved;
        if let Some(response) = response {
            self.approved_by = Some(response.responder.clone());
            self.approved_at = Some(response.timestamp);
        }
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sink
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Audit log errors.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to open audit log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write audit record: {0}")]
    Write(#[source] std::io::Error),

    #[error("audit log is closed")]
    Closed,
}

/// Destination for audit records.
///
/// Each `audit_request` call is atomic with respect to concurrent calls.
/// After `close`, further appends fail with [`AuditError::Closed`].
pub trait AuditSink: Send + Sync {
    fn audit_request(&self, record: &AuditRecord) -> Result<(), AuditError>;

    fn close(&self) -> Result<(), AuditError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::TransportMode;
    use serde_json::json;

    fn record() -> AuditRecord {
        let msg = json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"a": 1}});
        let request = ProxyRequest::from_message(
            "tools/call",
            Some(crate::jsonrpc::JsonRpcId::Number(3)),
            &msg,
            "cursor",
            TransportMode::Http,
        );
        AuditRecord::new(request, RiskVerdict::safe())
    }

    #[test]
    fn test_record_flattens_request_and_verdict() {
        let value = serde_json::to_value(record()).unwrap();
        assert_eq!(value["method"], "tools/call");
        assert_eq!(value["client_name"], "cursor");
        assert_eq!(value["mode"], "http");
        assert_eq!(value["request_id"], 3);
        assert_eq!(value["is_risky"], false);
        assert_eq!(value["level"], "none");
        assert_eq!(value["blocked"], false);
        assert!(value.get("approval_outcome").is_none());
    }

    #[test]
    fn test_record_with_approval() {
        let response = ApprovalResponse::new(true, "alice");
        let record = record().with_approval(ApprovalStatus::Approved, Some(&response));
        assert!(record.approval_requested);
        assert!(record.approved);
        assert_eq!(record.approved_by.as_deref(), Some("alice"));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["approval_outcome"], "approved");
    }

    #[test]
    fn test_record_timed_out_is_not_approved() {
        let record = record()
            .with_approval(ApprovalStatus::TimedOut, None)
            .blocked("approval timed out");
        assert!(!record.approved);
        assert!(record.blocked);
        assert_eq!(record.approved_by, None);
    }
}
