//! Slack interaction callback receiver.
//!
//! `POST /slack/interactions` authenticates the callback, extracts the
//! clicked action and writes the decision into the [`ApprovalStore`]. It is
//! the only path by which a decision reaches a waiting request.
//!
//! "First responder wins": a click on an already-resolved or expired approval
//! is logged and still answered with 200, so Slack does not retry delivery.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use super::slack::{APPROVE_ACTION, DENY_ACTION};
use super::{ApprovalResponse, ApprovalStore, SignatureVerifier, StoreError};
use crate::config::SlackSettings;

/// Path Slack posts interaction payloads to.
pub const INTERACTIONS_PATH: &str = "/slack/interactions";

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Shared state of the callback handlers.
#[derive(Debug)]
pub struct CallbackState {
    store: Arc<ApprovalStore>,
    /// `None` when signature verification is explicitly skipped.
    verifier: Option<SignatureVerifier>,
}

impl CallbackState {
    pub fn new(store: Arc<ApprovalStore>, verifier: Option<SignatureVerifier>) -> Self {
        Self { store, verifier }
    }

    pub fn from_settings(store: Arc<ApprovalStore>, settings: &SlackSettings) -> Self {
        let verifier = if settings.skip_verification {
            None
        } else {
            Some(SignatureVerifier::new(settings.signing_secret.clone()))
        };
        Self::new(store, verifier)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router & Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Build the callback router.
pub fn router(state: Arc<CallbackState>) -> Router {
    Router::new()
        .route(INTERACTIONS_PATH, post(interactions_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

/// Handle `POST /slack/interactions`.
async fn interactions_handler(
    State(state): State<Arc<CallbackState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(verifier) = &state.verifier {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        if let Err(e) = verifier.verify(header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER), &body)
        {
            warn!(error = %e, "rejected Slack callback");
            return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
        }
    }

    let decision = match Decision::parse(&body) {
        Ok(decision) => decision,
        Err(reason) => {
            warn!(%reason, "malformed Slack interaction payload");
            return (StatusCode::BAD_REQUEST, reason).into_response();
        }
    };

    let response = ApprovalResponse::new(decision.approved, decision.responder.clone());
    let text = match state.store.update_response(&decision.approval_id, response) {
        Ok(()) => {
            info!(
                approval_id = %decision.approval_id,
                approved = decision.approved,
                responder = %decision.responder,
                "approval decision recorded"
            );
            decision_text(decision.approved, &decision.responder)
        }
        Err(e) => {
            warn!(approval_id = %decision.approval_id, error = %e, "ignoring approval decision");
            match e {
                StoreError::AlreadyResolved { .. } => {
                    // Report the decision that actually stands.
                    match state
                        .store
                        .get_pending(&decision.approval_id)
                        .ok()
                        .and_then(|p| p.response)
                    {
                        Some(first) => decision_text(first.approved, &first.responder),
                        None => expired_text(),
                    }
                }
                StoreError::NotFound { .. } | StoreError::DuplicateId { .. } => expired_text(),
            }
        }
    };

    Json(json!({
        "replace_original": true,
        "text": text,
    }))
    .into_response()
}

/// Handle `GET /healthz`.
async fn healthz_handler(State(state): State<Arc<CallbackState>>) -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "pending": state.store.len()}))
}

fn decision_text(approved: bool, responder: &str) -> String {
    if approved {
        format!("✅ Approved by {responder}")
    } else {
        format!("❌ Denied by {responder}")
    }
}

fn expired_text() -> String {
    "⏱️ This approval request is no longer pending.".to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct InteractionPayload {
    #[serde(default)]
    actions: Vec<InteractionAction>,
    #[serde(default)]
    user: Option<InteractionUser>,
}

#[derive(Debug, Deserialize)]
struct InteractionAction {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InteractionUser {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl InteractionUser {
    fn display_name(&self) -> Option<String> {
        [&self.name, &self.username, &self.id]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
    }
}

/// A decoded button click.
#[derive(Debug, PartialEq, Eq)]
struct Decision {
    approval_id: String,
    approved: bool,
    responder: String,
}

impl Decision {
    /// Decode a form-encoded body with a JSON `payload` field.
    fn parse(body: &[u8]) -> Result<Self, String> {
        let payload = url::form_urlencoded::parse(body)
            .find(|(key, _)| key == "payload")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| "missing payload field".to_string())?;

        let payload: InteractionPayload =
            serde_json::from_str(&payload).map_err(|e| format!("invalid payload JSON: {e}"))?;

        let action = payload
            .actions
            .first()
            .ok_or_else(|| "payload has no actions".to_string())?;
        let approved = match action.action_id.as_str() {
            APPROVE_ACTION => true,
            DENY_ACTION => false,
            other => return Err(format!("unknown action_id '{other}'")),
        };
        let approval_id = action
            .value
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| "action has no approval id".to_string())?;
        let responder = payload
            .user
            .as_ref()
            .and_then(InteractionUser::display_name)
            .unwrap_or_else(|| "unknown".to_string());

        debug!(approval_id = %approval_id, approved, "decoded Slack interaction");
        Ok(Self {
            approval_id,
            approved,
            responder,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// Running callback listener.
#[derive(Debug)]
pub struct CallbackServer {
    local_addr: SocketAddr,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl CallbackServer {
    /// Bind `addr` and serve until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if binding fails.
    pub async fn spawn(
        addr: SocketAddr,
        state: Arc<CallbackState>,
        cancel: CancellationToken,
    ) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, path = INTERACTIONS_PATH, "Slack callback listener started");

        let app = router(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await
                .map_err(std::io::Error::other)
        });

        Ok(Self { local_addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server task to finish after cancellation.
    pub async fn join(self) -> Result<(), std::io::Error> {
        self.handle.await.map_err(std::io::Error::other)?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
