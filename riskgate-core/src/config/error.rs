//! Configuration error types.
//!
//! Every variant is fatal at startup: a gateway with an invalid approval
//! channel must never start forwarding traffic.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    // ─────────────────────────────────────────────────────────────────────────
    // Slack validation errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Slack approvals enabled without a bot token.
    #[error("slack.bot_token is required when slack.enabled is true")]
    MissingSlackToken,

    /// Slack approvals enabled without a channel or direct-message recipient.
    #[error("one of slack.channel_id or slack.user_id is required when slack.enabled is true")]
    MissingSlackTarget,

    /// Slack approvals enabled without a signing secret while verification is on.
    #[error(
        "slack.signing_secret is required unless slack.skip_verification is explicitly true"
    )]
    MissingSigningSecret,

    /// The callback listener port must be a positive number.
    #[error("slack.callback_port must be a positive port number, got {port}")]
    InvalidCallbackPort { port: u16 },

    /// The approval timeout must be positive.
    #[error("slack.timeout must be greater than zero")]
    ZeroApprovalTimeout,

    /// The Slack API base URL could not be parsed.
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Risk validation errors
    // ─────────────────────────────────────────────────────────────────────────
    /// A risk pattern is empty or whitespace-only and would match everything.
    #[error("empty pattern in risk.{field}")]
    EmptyRiskPattern { field: &'static str },

    // ─────────────────────────────────────────────────────────────────────────
    // I/O and parsing errors
    // ─────────────────────────────────────────────────────────────────────────
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    ParseError(#[from] serde_saphyr::Error),

    /// I/O error reading config file.
    #[error("I/O error reading {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file passed explicitly but absent.
    #[error("configuration file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },
}

/// Validation warnings (non-fatal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// Inbound Slack callbacks are accepted without signature verification.
    SignatureVerificationDisabled,

    /// Risk detection is off; every request is forwarded.
    RiskDetectionDisabled,

    /// Risky requests are recorded but neither blocked nor sent for approval.
    RiskNotEnforced,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignatureVerificationDisabled => write!(
                f,
                "slack.skip_verification is true: approval callbacks are not authenticated"
            ),
            Self::RiskDetectionDisabled => {
                write!(f, "risk.enabled is false: all requests are forwarded")
            }
            Self::RiskNotEnforced => write!(
                f,
                "risk.block_on_risk is false and slack is disabled: risky requests are only logged"
            ),
        }
    }
}

/// Result of configuration validation.
#[derive(Debug)]
pub struct ValidationResult {
    /// Non-fatal warnings encountered during validation.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Create a new validation result with no warnings.
    pub fn ok() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    /// Create a new validation result with warnings.
    pub fn with_warnings(warnings: Vec<ValidationWarning>) -> Self {
        Self { warnings }
    }

    /// Check if validation passed with no warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidCallbackPort { port: 0 };
        assert_eq!(
            err.to_string(),
            "slack.callback_port must be a positive port number, got 0"
        );
    }

    #[test]
    fn test_validation_warning_display() {
        let warn = ValidationWarning::RiskDetectionDisabled;
        assert_eq!(
            warn.to_string(),
            "risk.enabled is false: all requests are forwarded"
        );
    }

    #[test]
    fn test_validation_result() {
        let result = ValidationResult::ok();
        assert!(result.is_clean());

        let result_with_warnings =
            ValidationResult::with_warnings(vec![ValidationWarning::RiskNotEnforced]);
        assert!(!result_with_warnings.is_clean());
    }
}
