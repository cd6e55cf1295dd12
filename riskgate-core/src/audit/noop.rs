use std::sync::atomic::{AtomicBool, Ordering};

use super::{AuditError, AuditRecord, AuditSink};

/// Sink used when auditing is disabled. Discards records but honours `close`.
#[derive(Debug, Default)]
pub struct NoopAuditLog {
    closed: AtomicBool,
}

impl NoopAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for NoopAuditLog {
    fn audit_request(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AuditError::Closed);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), AuditError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ProxyRequest, TransportMode};
    use crate::risk::RiskVerdict;
    use serde_json::json;

    #[test]
    fn test_noop_contract() {
        let sink = NoopAuditLog::new();
        let msg = json!({"jsonrpc": "2.0", "method": "ping"});
        let record = AuditRecord::new(
            ProxyRequest::from_message("ping", None, &msg, "", TransportMode::Stdio),
            RiskVerdict::safe(),
        );
        assert!(sink.audit_request(&record).is_ok());
        sink.close().unwrap();
        assert!(matches!(
            sink.audit_request(&record),
            Err(AuditError::Closed)
        ));
    }
}
