//! Configuration loading and validation.
//!
//! Loading flow: locate file → read → environment substitution → YAML parse →
//! validate. A missing file at a default location is not an error: the
//! built-in defaults apply. A missing file passed explicitly is.

use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::defaults::APP_DIR_NAME;
use super::error::{ConfigError, ValidationResult, ValidationWarning};
use super::schema::Config;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "RISKGATE_CONFIG";

/// Configuration file search paths (in priority order).
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(path));
    }

    paths.push(PathBuf::from("./riskgate.yaml"));

    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join(APP_DIR_NAME).join("config.yaml"));
    }

    paths
}

/// Find the config file to load.
///
/// Returns `Ok(None)` when no explicit path was given and none of the default
/// locations exist.
pub fn find_config_file(explicit_path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit_path {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(ConfigError::ConfigFileNotFound {
            path: path.to_path_buf(),
        });
    }

    Ok(default_config_paths().into_iter().find(|p| p.exists()))
}

/// Load configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents)
}

/// Parse configuration from YAML text, applying environment substitution.
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    // An empty document means "all defaults".
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }

    let contents = substitute_env_vars(contents);
    let config: Config = serde_saphyr::from_str(&contents)?;
    Ok(config)
}

/// Locate, load and validate configuration.
///
/// Validation warnings are logged here so every entry point reports them.
pub fn load_and_validate(explicit_path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match find_config_file(explicit_path)? {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            load_config(&path)?
        }
        None => {
            tracing::info!("no configuration file found, using defaults");
            Config::default()
        }
    };

    let result = validate(&config)?;
    for warning in &result.warnings {
        tracing::warn!(%warning, "configuration warning");
    }
    Ok(config)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment Variable Substitution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// SAFETY: .expect() on LazyLock with a compile-time literal regex pattern.
// The pattern is known-valid and tested by test_env_var_pattern_compiles().
static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("BUG: ENV_VAR_PATTERN regex is invalid; this is a programmer error")
});

/// Substitute environment variables in a string.
///
/// # Syntax
/// - `${VAR}` and `$VAR` - value of `VAR`, empty when unset
/// - `${VAR:-default}` - value of `VAR`, or `default` when unset or empty
/// - `$$` - a literal `$`
pub fn substitute_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &Captures<'_>| {
            let Some(name) = caps.get(1).or_else(|| caps.get(3)) else {
                return "$".to_string();
            };
            match std::env::var(name.as_str()) {
                Ok(value) if !value.is_empty() => value,
                _ => caps
                    .get(2)
                    .map(|d| d.as_str().to_string())
                    .unwrap_or_default(),
            }
        })
        .into_owned()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validate a configuration.
pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
    let mut warnings = Vec::new();

    let risk = &config.risk;
    for (field, patterns) in [
        ("risky_methods", &risk.risky_methods),
        ("risky_keywords", &risk.risky_keywords),
        ("allowed_methods", &risk.allowed_methods),
    ] {
        if patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::EmptyRiskPattern { field });
        }
    }

    if !risk.enabled {
        warnings.push(ValidationWarning::RiskDetectionDisabled);
    }

    let slack = &config.slack;
    if slack.enabled {
        if slack.bot_token.trim().is_empty() {
            return Err(ConfigError::MissingSlackToken);
        }
        if slack.target().is_none() {
            return Err(ConfigError::MissingSlackTarget);
        }
        if slack.signing_secret.trim().is_empty() && !slack.skip_verification {
            return Err(ConfigError::MissingSigningSecret);
        }
        if slack.callback_port == 0 {
            return Err(ConfigError::InvalidCallbackPort {
                port: slack.callback_port,
            });
        }
        if slack.timeout.is_zero() {
            return Err(ConfigError::ZeroApprovalTimeout);
        }
        if let Err(e) = url::Url::parse(&slack.api_base_url) {
            return Err(ConfigError::InvalidUrl {
                url: slack.api_base_url.clone(),
                message: e.to_string(),
            });
        }
        if slack.skip_verification {
            warnings.push(ValidationWarning::SignatureVerificationDisabled);
        }
    } else if risk.enabled && !risk.block_on_risk {
        warnings.push(ValidationWarning::RiskNotEnforced);
    }

    Ok(ValidationResult::with_warnings(warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    const SLACK_CONFIG: &str = r#"
slack:
  enabled: true
  bot_token: xoxb-test
  channel_id: C123
  signing_secret: secret
  callback_port: 9000
  timeout: 2m
"#;

    /// Verify the LazyLock regex compiles successfully.
    #[test]
    fn test_env_var_pattern_compiles() {
        let _ = &*ENV_VAR_PATTERN;
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config("   \n").unwrap();
        assert!(config.risk.enabled);
        assert!(!config.slack.enabled);
    }

    #[test]
    fn test_parse_slack_config() {
        let config = parse_config(SLACK_CONFIG).unwrap();
        assert!(config.slack.enabled);
        assert_eq!(config.slack.callback_port, 9000);
        assert_eq!(config.slack.timeout, Duration::from_secs(120));
        assert!(validate(&config).unwrap().is_clean());
    }

    #[test]
    fn test_parse_risk_overrides_keep_other_defaults() {
        let config = parse_config("risk:\n  risky_methods: [delete]\n").unwrap();
        assert_eq!(config.risk.risky_methods, vec!["delete".to_string()]);
        assert!(!config.risk.risky_keywords.is_empty());
        assert!(config.risk.block_on_risk);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = parse_config("risk:\n  enabeld: true\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_missing_token() {
        let mut config = parse_config(SLACK_CONFIG).unwrap();
        config.slack.bot_token.clear();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingSlackToken)
        ));
    }

    #[test]
    fn test_validate_missing_target() {
        let mut config = parse_config(SLACK_CONFIG).unwrap();
        config.slack.channel_id = None;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingSlackTarget)
        ));
    }

    #[test]
    fn test_validate_user_target_accepted() {
        let mut config = parse_config(SLACK_CONFIG).unwrap();
        config.slack.channel_id = None;
        config.slack.user_id = Some("U42".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_missing_signing_secret() {
        let mut config = parse_config(SLACK_CONFIG).unwrap();
        config.slack.signing_secret.clear();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingSigningSecret)
        ));
    }

    #[test]
    fn test_validate_skip_verification_allows_missing_secret() {
        let mut config = parse_config(SLACK_CONFIG).unwrap();
        config.slack.signing_secret.clear();
        config.slack.skip_verification = true;
        let result = validate(&config).unwrap();
        assert_eq!(
            result.warnings,
            vec![ValidationWarning::SignatureVerificationDisabled]
        );
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = parse_config(SLACK_CONFIG).unwrap();
        config.slack.callback_port = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidCallbackPort { port: 0 })
        ));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = parse_config(SLACK_CONFIG).unwrap();
        config.slack.timeout = Duration::ZERO;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::ZeroApprovalTimeout)
        ));
    }

    #[test]
    fn test_validate_disabled_slack_ignores_missing_fields() {
        let config = parse_config("slack:\n  enabled: false\n").unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_pattern_rejected() {
        let config = parse_config("risk:\n  risky_keywords: ['DROP', '  ']\n").unwrap();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::EmptyRiskPattern {
                field: "risky_keywords"
            })
        ));
    }

    #[test]
    fn test_validate_risk_not_enforced_warning() {
        let config = parse_config("risk:\n  block_on_risk: false\n").unwrap();
        let result = validate(&config).unwrap();
        assert_eq!(result.warnings, vec![ValidationWarning::RiskNotEnforced]);
    }

    #[test]
    #[serial]
    fn test_env_var_substitution_braced_and_bare() {
        unsafe {
            std::env::set_var("RISKGATE_TEST_TOKEN", "xoxb-from-env");
        }
        let result = substitute_env_vars("a: ${RISKGATE_TEST_TOKEN}\nb: $RISKGATE_TEST_TOKEN");
        assert_eq!(result, "a: xoxb-from-env\nb: xoxb-from-env");
        unsafe {
            std::env::remove_var("RISKGATE_TEST_TOKEN");
        }
    }

    #[test]
    #[serial]
    fn test_env_var_substitution_with_default() {
        unsafe {
            std::env::remove_var("RISKGATE_MISSING_VAR");
        }
        let result = substitute_env_vars("url: ${RISKGATE_MISSING_VAR:-fallback}");
        assert_eq!(result, "url: fallback");
    }

    #[test]
    #[serial]
    fn test_env_var_substitution_missing_is_empty() {
        unsafe {
            std::env::remove_var("RISKGATE_MISSING_VAR");
        }
        let result = substitute_env_vars("token: '$RISKGATE_MISSING_VAR'");
        assert_eq!(result, "token: ''");
    }

    #[test]
    fn test_env_var_substitution_escaped_dollar() {
        assert_eq!(substitute_env_vars("cost: $$5"), "cost: $5");
    }

    #[test]
    #[serial]
    fn test_load_config_with_env_token() {
        unsafe {
            std::env::set_var("RISKGATE_TEST_BOT_TOKEN", "xoxb-env");
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("riskgate.yaml");
        std::fs::write(
            &path,
            "slack:\n  enabled: true\n  bot_token: ${RISKGATE_TEST_BOT_TOKEN}\n  user_id: U1\n  signing_secret: s\n",
        )
        .unwrap();

        let config = load_and_validate(Some(&path)).unwrap();
        assert_eq!(config.slack.bot_token, "xoxb-env");
        unsafe {
            std::env::remove_var("RISKGATE_TEST_BOT_TOKEN");
        }
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = find_config_file(Some(Path::new("/nonexistent/riskgate.yaml")));
        assert!(matches!(
            result,
            Err(ConfigError::ConfigFileNotFound { .. })
        ));
    }
}
