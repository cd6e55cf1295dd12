//! In-memory registry of approvals awaiting a human decision.
//!
//! One `RwLock` guards the whole map: reads take the shared lock, every
//! mutation the exclusive lock. The completion signal lives inside the
//! entry and is taken under the exclusive lock, so it fires at most once.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::oneshot;

use super::{ApprovalRequest, ApprovalResponse};

/// Store consistency errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("approval {id} already exists")]
    DuplicateId { id: String },

    #[error("approval {id} not found")]
    NotFound { id: String },

    #[error("approval {id} already resolved")]
    AlreadyResolved { id: String },
}

/// Snapshot of a pending approval.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub id: String,
    pub request: ApprovalRequest,
    pub created_at: DateTime<Utc>,
    /// Write-once.
    pub response: Option<ApprovalResponse>,
}

impl PendingApproval {
    pub fn is_resolved(&self) -> bool {
        self.response.is_some()
    }
}

struct Entry {
    pending: PendingApproval,
    signal: Option<oneshot::Sender<()>>,
}

/// Thread-safe approval registry. Owns every [`PendingApproval`].
#[derive(Default)]
pub struct ApprovalStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl ApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and return the receiver of its completion signal.
    pub fn create_pending(
        &self,
        request: ApprovalRequest,
    ) -> Result<oneshot::Receiver<()>, StoreError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&request.id) {
            return Err(StoreError::DuplicateId { id: request.id });
        }

        let (tx, rx) = oneshot::channel();
        let id = request.id.clone();
        let pending = PendingApproval {
            id: id.clone(),
            created_at: request.created_at,
            request,
            response: None,
        };
        entries.insert(
            id,
            Entry {
                pending,
                signal: Some(tx),
            },
        );
        Ok(rx)
    }

    pub fn get_pending(&self, id: &str) -> Result<PendingApproval, StoreError> {
        self.entries
            .read()
            .get(id)
            .map(|e| e.pending.clone())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    /// Attach the decision and fire the completion signal.
    ///
    /// A second call for the same id fails and leaves the first response
    /// in place.
    pub fn update_response(&self, id: &str, response: ApprovalResponse) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if entry.pending.response.is_some() {
            return Err(StoreError::AlreadyResolved { id: id.to_string() });
        }
        entry.pending.response = Some(response);

        if let Some(signal) = entry.signal.take() {
            // The waiter may already have given up; the response still stands.
            let _ = signal.send(());
        }
        Ok(())
    }

    pub fn delete_pending(&self, id: &str) -> Result<PendingApproval, StoreError> {
        self.entries
            .write()
            .remove(id)
            .map(|e| e.pending)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for ApprovalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalStore")
            .field("pending", &self.len())
            .finish()
    }
}
