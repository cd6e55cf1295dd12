//! Centralized default values for riskgate configuration.
//!
//! The default rule lists are ordered: the first match wins, so more
//! specific keywords come before shorter ones.

use std::path::PathBuf;
use std::time::Duration;

/// Methods that are risky by name.
pub const DEFAULT_RISKY_METHODS: &[&str] = &[
    "delete",
    "remove",
    "drop",
    "destroy",
    "truncate",
    "purge",
    "kill",
    "terminate",
    "revoke",
    "exec",
];

/// Dangerous fragments searched for in serialized request parameters.
pub const DEFAULT_RISKY_KEYWORDS: &[&str] = &[
    "DROP TABLE",
    "DROP DATABASE",
    "TRUNCATE TABLE",
    "DELETE FROM",
    "ALTER TABLE",
    "GRANT ALL",
    "rm -rf",
    "mkfs",
    "dd if=",
    "chmod 777",
    "shutdown -h",
    ":(){ :|:& };:",
];

/// Read-only protocol methods exempt from the method-name check.
pub const DEFAULT_ALLOWED_METHODS: &[&str] = &[
    "initialize",
    "ping",
    "tools/list",
    "resources/list",
    "resources/read",
    "prompts/list",
    "prompts/get",
];

/// Default port for the Slack interaction callback listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 8089;

/// Default time to wait for a human decision.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(300);

/// Default Slack Web API base URL.
pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";

/// Maximum clock skew tolerated on inbound Slack callbacks.
pub const MAX_CALLBACK_SKEW_SECS: i64 = 300;

/// Directory under the user's config dir holding riskgate state.
pub const APP_DIR_NAME: &str = "riskgate";

/// Default audit log location: `<config_dir>/riskgate/audit.jsonl`.
///
/// Falls back to the working directory when the platform has no config dir.
pub fn default_audit_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("audit.jsonl")
}

pub(crate) fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}
