//! Configuration schema type definitions.
//!
//! # Example
//! ```yaml
//! risk:
//!   enabled: true
//!   block_on_risk: true
//!   risky_methods: [delete, drop]
//!
//! slack:
//!   enabled: true
//!   bot_token: ${SLACK_BOT_TOKEN}
//!   channel_id: C0123456789
//!   signing_secret: ${SLACK_SIGNING_SECRET}
//!   callback_port: 8089
//!   timeout: 5m
//!
//! audit:
//!   path: /var/log/riskgate/audit.jsonl
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::{
    DEFAULT_ALLOWED_METHODS, DEFAULT_APPROVAL_TIMEOUT, DEFAULT_CALLBACK_PORT,
    DEFAULT_RISKY_KEYWORDS, DEFAULT_RISKY_METHODS, DEFAULT_SLACK_API_BASE_URL,
    default_audit_path, owned,
};
use super::duration_format;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-Level Schema
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Root configuration structure.
///
/// Every section is optional; omitted sections take their defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Risk classification rules.
    #[serde(default)]
    pub risk: RiskConfig,

    /// Slack approval channel.
    #[serde(default)]
    pub slack: SlackSettings,

    /// Audit log settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Risk Configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pattern rules for the risk detector.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    /// Master switch for risk detection.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Block risky requests when no approval flow is configured.
    #[serde(default = "default_true")]
    pub block_on_risk: bool,

    /// Case-insensitive substrings that make a method name risky.
    #[serde(default = "default_risky_methods")]
    pub risky_methods: Vec<String>,

    /// Case-insensitive substrings that make serialized params risky.
    #[serde(default = "default_risky_keywords")]
    pub risky_keywords: Vec<String>,

    /// Methods exempt from the method-name check (params are still scanned).
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            block_on_risk: true,
            risky_methods: default_risky_methods(),
            risky_keywords: default_risky_keywords(),
            allowed_methods: default_allowed_methods(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slack Configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Slack approval channel settings.
///
/// `Debug` is implemented by hand so the bot token and signing secret never
/// reach a log line.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlackSettings {
    /// Route risky requests to a human for approval.
    #[serde(default)]
    pub enabled: bool,

    /// Bot token (`xoxb-…`).
    #[serde(default)]
    pub bot_token: String,

    /// Channel that receives approval messages.
    #[serde(default)]
    pub channel_id: Option<String>,

    /// User that receives approval messages as a direct message.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Signing secret used to authenticate interaction callbacks.
    #[serde(default)]
    pub signing_secret: String,

    /// Accept callbacks without verifying their signature.
    #[serde(default)]
    pub skip_verification: bool,

    /// Port of the interaction callback listener.
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,

    /// Time to wait for a human decision before denying.
    #[serde(
        default = "default_approval_timeout",
        deserialize_with = "duration_format::deserialize",
        serialize_with = "duration_format::serialize"
    )]
    pub timeout: Duration,

    /// Slack Web API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            channel_id: None,
            user_id: None,
            signing_secret: String::new(),
            skip_verification: false,
            callback_port: DEFAULT_CALLBACK_PORT,
            timeout: DEFAULT_APPROVAL_TIMEOUT,
            api_base_url: default_api_base_url(),
        }
    }
}

impl std::fmt::Debug for SlackSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackSettings")
            .field("enabled", &self.enabled)
            .field("bot_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("user_id", &self.user_id)
            .field("signing_secret", &"[REDACTED]")
            .field("skip_verification", &self.skip_verification)
            .field("callback_port", &self.callback_port)
            .field("timeout", &self.timeout)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl SlackSettings {
    /// Where approval messages are delivered.
    ///
    /// A channel takes precedence over a direct-message recipient.
    pub fn target(&self) -> Option<SlackTarget> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|v| !v.trim().is_empty())
        }

        if let Some(channel) = non_empty(&self.channel_id) {
            return Some(SlackTarget::Channel(channel.to_string()));
        }
        non_empty(&self.user_id).map(|user| SlackTarget::DirectMessage(user.to_string()))
    }
}

/// Delivery target for approval messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackTarget {
    /// Post into a fixed channel.
    Channel(String),
    /// Open a DM with this user and post there.
    DirectMessage(String),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Audit Configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Audit log settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Write one JSON line per mediated request.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Audit file location (defaults under the user config directory).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditConfig {
    /// Configured path, or the default location.
    pub fn path_or_default(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_audit_path)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Serde defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn default_true() -> bool {
    true
}

fn default_risky_methods() -> Vec<String> {
    owned(DEFAULT_RISKY_METHODS)
}

fn default_risky_keywords() -> Vec<String> {
    owned(DEFAULT_RISKY_KEYWORDS)
}

fn default_allowed_methods() -> Vec<String> {
    owned(DEFAULT_ALLOWED_METHODS)
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

fn default_approval_timeout() -> Duration {
    DEFAULT_APPROVAL_TIMEOUT
}

fn default_api_base_url() -> String {
    DEFAULT_SLACK_API_BASE_URL.to_string()
}
