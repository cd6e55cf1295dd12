//! Mock approval notifier for testing.
//!
//! Records every request it is asked to deliver. Optionally resolves each
//! request itself after a delay by writing straight into the approval
//! store, standing in for a human clicking a button. Used by tests and by
//! `--mock-approvals` runs without Slack.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    ApprovalNotifier, ApprovalRequest, ApprovalResponse, ApprovalStore, NotificationRef,
    NotifierError,
};

/// Identity recorded for automatic decisions.
pub const MOCK_RESPONDER: &str = "mock-approver";

struct AutoDecision {
    store: Arc<ApprovalStore>,
    delay: Duration,
    approve: bool,
}

/// In-process notifier.
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<ApprovalRequest>>,
    send_count: AtomicU32,
    expired_count: AtomicU32,
    failing: AtomicBool,
    auto: Option<AutoDecision>,
}

impl MockNotifier {
    /// A notifier that records requests and never decides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every delivered request after `delay`.
    #[must_use]
    pub fn with_auto_decision(
        mut self,
        store: Arc<ApprovalStore>,
        delay: Duration,
        approve: bool,
    ) -> Self {
        self.auto = Some(AutoDecision {
            store,
            delay,
            approve,
        });
        self
    }

    /// Make subsequent deliveries fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Requests delivered so far, oldest first.
    pub fn sent_requests(&self) -> Vec<ApprovalRequest> {
        self.sent.lock().clone()
    }

    pub fn send_count(&self) -> u32 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn expired_count(&self) -> u32 {
        self.expired_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApprovalNotifier for MockNotifier {
    async fn send_approval_request(
        &self,
        request: &ApprovalRequest,
    ) -> Result<NotificationRef, NotifierError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifierError::Delivery {
                reason: "mock notifier set to fail".to_string(),
                retriable: false,
            });
        }

        let n = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().push(request.clone());
        debug!(approval_id = %request.id, "mock notifier recorded approval request");

        if let Some(auto) = &self.auto {
            let store = Arc::clone(&auto.store);
            let (delay, approve) = (auto.delay, auto.approve);
            let id = request.id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let response = ApprovalResponse::new(approve, MOCK_RESPONDER);
                match store.update_response(&id, response) {
                    Ok(()) => info!(approval_id = %id, approve, "mock approval decided"),
                    Err(e) => debug!(approval_id = %id, error = %e, "mock decision dropped"),
                }
            });
        }

        Ok(NotificationRef {
            correlation_id: format!("mock-{n}"),
            channel: "mock".to_string(),
        })
    }

    async fn mark_expired(
        &self,
        _notification: &NotificationRef,
        _request: &ApprovalRequest,
    ) -> Result<(), NotifierError> {
        self.expired_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
