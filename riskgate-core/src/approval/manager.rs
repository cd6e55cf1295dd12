//! One risky request's approval lifecycle.
//!
//! register → notify → wait for the first of {decision, timeout, cancel} →
//! clean up. The pending entry is removed on every exit path, including the
//! calling future being dropped mid-wait.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    ApprovalNotifier, ApprovalRequest, ApprovalResponse, ApprovalStore, NotificationRef,
    NotifierError, StoreError,
};
use crate::audit::AuditRecord;

/// A decision that arrived in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalOutcome {
    pub approved: bool,
    pub response: ApprovalResponse,
}

/// Reasons an approval wait ended without a decision.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// Delivery failed; nothing was waited on.
    #[error("notification failed: {0}")]
    Notification(#[from] NotifierError),

    #[error("approval timed out after {}", humantime::format_duration(*timeout))]
    Timeout { timeout: Duration },

    #[error("approval cancelled")]
    Cancelled,

    #[error("approval store error: {0}")]
    Store(#[from] StoreError),
}

/// Orchestrates approvals against a store and a notifier.
pub struct ApprovalManager {
    store: Arc<ApprovalStore>,
    notifier: Arc<dyn ApprovalNotifier>,
    timeout: Duration,
}

impl ApprovalManager {
    pub fn new(
        store: Arc<ApprovalStore>,
        notifier: Arc<dyn ApprovalNotifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            timeout,
        }
    }

    pub fn store(&self) -> &Arc<ApprovalStore> {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask a human to approve the request described by `record`.
    ///
    /// Returns `Ok` with the decision (approved or denied) when a response
    /// arrives first. Timeout, cancellation and delivery failure are errors.
    pub async fn request_approval(
        &self,
        record: &AuditRecord,
        cancel: &CancellationToken,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        let request = ApprovalRequest::from_record(Uuid::new_v4().to_string(), record);
        let id = request.id.clone();

        let signal = self.store.create_pending(request.clone())?;
        let _cleanup = PendingCleanup {
            store: &self.store,
            id: &id,
        };

        let sent = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                info!(approval_id = %id, "approval cancelled during delivery");
                return Err(ApprovalError::Cancelled);
            }
            sent = self.notifier.send_approval_request(&request) => sent,
        };
        let notification = sent.inspect_err(|e| {
            warn!(
                approval_id = %id,
                notifier = self.notifier.name(),
                error = %e,
                "failed to deliver approval request"
            );
        })?;

        info!(
            approval_id = %id,
            method = %request.method,
            notifier = self.notifier.name(),
            correlation_id = %notification.correlation_id,
            timeout = %humantime::format_duration(self.timeout),
            "awaiting approval"
        );

        tokio::select! {
            biased;

            signalled = signal => {
                signalled.map_err(|_| StoreError::NotFound { id: id.clone() })?;
                let response = self
                    .store
                    .get_pending(&id)?
                    .response
                    .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;

                info!(
                    approval_id = %id,
                    approved = response.approved,
                    responder = %response.responder,
                    "approval resolved"
                );
                Ok(ApprovalOutcome {
                    approved: response.approved,
                    response,
                })
            }
            () = cancel.cancelled() => {
                info!(approval_id = %id, "approval wait cancelled");
                Err(ApprovalError::Cancelled)
            }
            () = tokio::time::sleep(self.timeout) => {
                warn!(approval_id = %id, "approval timed out");
                self.expire(notification, request);
                Err(ApprovalError::Timeout { timeout: self.timeout })
            }
        }
    }

    /// Mark the delivered message expired without delaying the denial.
    fn expire(&self, notification: NotificationRef, request: ApprovalRequest) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.mark_expired(&notification, &request).await {
                debug!(approval_id = %request.id, error = %e, "failed to mark approval expired");
            }
        });
    }
}

impl std::fmt::Debug for ApprovalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalManager")
            .field("notifier", &self.notifier.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

struct PendingCleanup<'a> {
    store: &'a ApprovalStore,
    id: &'a str,
}

impl Drop for PendingCleanup<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.delete_pending(self.id) {
            debug!(approval_id = %self.id, error = %e, "pending approval already removed");
        }
    }
}
