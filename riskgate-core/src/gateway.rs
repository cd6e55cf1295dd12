//! Composition root.
//!
//! Builds every component from a validated [`Config`] and owns them for the
//! lifetime of one proxy run. Transports only see the mediator and the
//! cancellation token.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::approval::{
    ApprovalManager, ApprovalNotifier, ApprovalStore, CallbackServer, CallbackState, MockNotifier,
    NotifierError, SlackNotifier,
};
use crate::audit::{AuditError, AuditSink, JsonlAuditLog, NoopAuditLog};
use crate::config::{self, Config, ConfigError};
use crate::mediator::RiskAwareMediator;
use crate::risk::RiskDetector;

/// Delay before the mock notifier approves a request on its own.
pub const MOCK_DECISION_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open audit log: {0}")]
    Audit(#[from] AuditError),

    #[error("failed to create Slack notifier: {0}")]
    Notifier(#[from] NotifierError),

    #[error("failed to bind callback listener on {addr}: {source}")]
    CallbackBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Runtime switches that are not part of the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayOptions {
    /// Replace Slack with an in-process notifier that approves every request
    /// after [`MOCK_DECISION_DELAY`].
    pub mock_approvals: bool,
}

/// Owns the audit sink, approval store, notifier, mediator and callback
/// listener.
pub struct Gateway {
    mediator: Arc<RiskAwareMediator>,
    audit: Arc<dyn AuditSink>,
    store: Arc<ApprovalStore>,
    notifier: Option<Arc<dyn ApprovalNotifier>>,
    callback: Option<CallbackServer>,
    cancel: CancellationToken,
}

impl Gateway {
    /// Validate `config` and start every component it enables.
    ///
    /// # Errors
    ///
    /// Fails when the config is invalid, the audit file cannot be opened,
    /// or the callback port cannot be bound.
    pub async fn from_config(config: &Config, options: GatewayOptions) -> Result<Self, GatewayError> {
        config::validate(config)?;

        let audit: Arc<dyn AuditSink> = if config.audit.enabled {
            let path = config.audit.path_or_default();
            let log = JsonlAuditLog::open(&path)?;
            info!(path = %path.display(), "audit log opened");
            Arc::new(log)
        } else {
            warn!("audit logging disabled");
            Arc::new(NoopAuditLog::new())
        };

        let store = Arc::new(ApprovalStore::new());
        let cancel = CancellationToken::new();
        let slack = &config.slack;

        let notifier: Option<Arc<dyn ApprovalNotifier>> = if options.mock_approvals {
            warn!("mock approvals enabled: risky requests are approved automatically");
            Some(Arc::new(MockNotifier::new().with_auto_decision(
                Arc::clone(&store),
                MOCK_DECISION_DELAY,
                true,
            )))
        } else if slack.enabled {
            Some(Arc::new(SlackNotifier::from_settings(slack)?))
        } else {
            None
        };

        let callback = if slack.enabled && !options.mock_approvals {
            let addr = SocketAddr::from(([0, 0, 0, 0], slack.callback_port));
            let state = Arc::new(CallbackState::from_settings(Arc::clone(&store), slack));
            let server = CallbackServer::spawn(addr, state, cancel.clone())
                .await
                .map_err(|source| GatewayError::CallbackBind { addr, source })?;
            Some(server)
        } else {
            None
        };

        let mut mediator = RiskAwareMediator::new(
            RiskDetector::new(&config.risk),
            Arc::clone(&audit),
            config.risk.block_on_risk,
        );
        if let Some(notifier) = &notifier {
            let manager = ApprovalManager::new(Arc::clone(&store), Arc::clone(notifier), slack.timeout);
            mediator = mediator.with_approvals(Arc::new(manager));
        }

        info!(
            risk_detection = config.risk.enabled,
            block_on_risk = config.risk.block_on_risk,
            notifier = notifier.as_ref().map_or("none", |n| n.name()),
            "gateway ready"
        );

        Ok(Self {
            mediator: Arc::new(mediator),
            audit,
            store,
            notifier,
            callback,
            cancel,
        })
    }

    pub fn mediator(&self) -> Arc<RiskAwareMediator> {
        Arc::clone(&self.mediator)
    }

    /// Token that aborts approval waits and stops the callback listener.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Arc<ApprovalStore> {
        &self.store
    }

    /// Address the callback listener is bound to, if running.
    pub fn callback_addr(&self) -> Option<SocketAddr> {
        self.callback.as_ref().map(CallbackServer::local_addr)
    }

    /// Stop the listener, abort pending waits and close the audit log.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Audit` if the final audit flush fails.
    pub async fn shutdown(self) -> Result<(), GatewayError> {
        self.cancel.cancel();
        if let Some(server) = self.callback {
            if let Err(e) = server.join().await {
                warn!(error = %e, "callback listener exited with error");
            }
        }
        self.audit.close()?;
        info!(pending = self.store.len(), "gateway stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("mediator", &self.mediator)
            .field("notifier", &self.notifier.as_ref().map(|n| n.name()))
            .field("callback", &self.callback_addr())
            .finish_non_exhaustive()
    }
}
