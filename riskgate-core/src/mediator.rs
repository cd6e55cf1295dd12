//! Per-request policy decision: forward, block, or wait for a human.
//!
//! | risky | approval flow | outcome |
//! |---|---|---|
//! | no | - | audit, allow |
//! | yes | enabled | request approval, audit with outcome, allow iff approved |
//! | yes | disabled, `block_on_risk` | audit as blocked, refuse naming the rule |
//! | yes | disabled, no `block_on_risk` | audit, allow |
//!
//! Every mediated request produces exactly one audit record. An audit write
//! failure is logged and does not change the decision.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::approval::{ApprovalError, ApprovalManager};
use crate::audit::{ApprovalStatus, AuditRecord, AuditSink};
use crate::error::MediationError;
use crate::request::ProxyRequest;
use crate::risk::RiskDetector;

/// Composes risk detection, human approval and auditing.
pub struct RiskAwareMediator {
    detector: RiskDetector,
    approvals: Option<Arc<ApprovalManager>>,
    audit: Arc<dyn AuditSink>,
    block_on_risk: bool,
}

impl RiskAwareMediator {
    pub fn new(detector: RiskDetector, audit: Arc<dyn AuditSink>, block_on_risk: bool) -> Self {
        Self {
            detector,
            approvals: None,
            audit,
            block_on_risk,
        }
    }

    /// Route risky requests to a human instead of applying `block_on_risk`.
    #[must_use]
    pub fn with_approvals(mut self, manager: Arc<ApprovalManager>) -> Self {
        self.approvals = Some(manager);
        self
    }

    pub fn approval_flow_enabled(&self) -> bool {
        self.approvals.is_some()
    }

    /// Decide whether `request` may be forwarded.
    ///
    /// `Ok(())` means forward. `cancel` aborts an in-flight approval wait.
    pub async fn audit_request(
        &self,
        request: &ProxyRequest,
        cancel: &CancellationToken,
    ) -> Result<(), MediationError> {
        let verdict = self.detector.detect_risk(request);
        let record = AuditRecord::new(request.clone(), verdict);

        if !record.verdict.is_risky {
            debug!(method = %request.method, "request allowed");
            self.append(&record);
            return Ok(());
        }

        info!(
            method = %request.method,
            client = %request.client_name,
            rule = %record.verdict.matched_rule,
            level = %record.verdict.level,
            "risky request detected"
        );

        let (record, decision) = match &self.approvals {
            Some(manager) => Self::decide_with_approval(manager, record, cancel).await,
            None if self.block_on_risk => {
                let reason = format!("blocked by risk rule {}", record.verdict.matched_rule);
                (record.blocked(reason.clone()), Err(reason))
            }
            None => {
                warn!(
                    method = %request.method,
                    rule = %record.verdict.matched_rule,
                    "risky request forwarded (block_on_risk disabled)"
                );
                (record, Ok(()))
            }
        };

        self.append(&record);

        decision.map_err(|reason| {
            warn!(method = %request.method, %reason, "request blocked");
            MediationError::Blocked { reason }
        })
    }

    async fn decide_with_approval(
        manager: &ApprovalManager,
        record: AuditRecord,
        cancel: &CancellationToken,
    ) -> (AuditRecord, Result<(), String>) {
        match manager.request_approval(&record, cancel).await {
            Ok(outcome) if outcome.approved => (
                record.with_approval(ApprovalStatus::Approved, Some(&outcome.response)),
                Ok(()),
            ),
            Ok(outcome) => {
                let reason = format!("denied by {}", outcome.response.responder);
                let record = record
                    .with_approval(ApprovalStatus::Denied, Some(&outcome.response))
                    .blocked(reason.clone());
                (record, Err(reason))
            }
            Err(e) => {
                let status = match &e {
                    ApprovalError::Timeout { .. } => ApprovalStatus::TimedOut,
                    ApprovalError::Cancelled => ApprovalStatus::Cancelled,
                    ApprovalError::Notification(_) | ApprovalError::Store(_) => {
                        ApprovalStatus::Failed
                    }
                };
                let reason = e.to_string();
                let record = record.with_approval(status, None).blocked(reason.clone());
                (record, Err(reason))
            }
        }
    }

    fn append(&self, record: &AuditRecord) {
        if let Err(e) = self.audit.audit_request(record) {
            error!(method = %record.request.method, error = %e, "failed to write audit record");
        }
    }
}

impl std::fmt::Debug for RiskAwareMediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskAwareMediator")
            .field("detector", &self.detector)
            .field("approvals", &self.approvals)
            .field("block_on_risk", &self.block_on_risk)
            .finish_non_exhaustive()
    }
}
