//! Pattern-based risk classification.
//!
//! # Rule order
//!
//! 1. Detection disabled: `none`.
//! 2. Method on the allow-list: skip step 3 only.
//! 3. Method contains a risky-method pattern: `high`, `method:<pattern>`.
//! 4. Serialized params contain a risky keyword: `high`, `keyword:<keyword>`.
//! 5. Otherwise `none`.
//!
//! The allow-list never suppresses the parameter scan, so an allow-listed
//! read method carrying a destructive payload is still flagged. All matching
//! is case-insensitive substring matching; the first pattern in configured
//! order wins.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::RiskConfig;
use crate::request::ProxyRequest;

/// Ordinal risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

/// Classifier output for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub is_risky: bool,
    pub level: RiskLevel,
    pub reason: String,
    /// `method:<pattern>`, `keyword:<keyword>`, or empty.
    pub matched_rule: String,
}

impl RiskVerdict {
    /// A verdict that lets the request through.
    pub fn safe() -> Self {
        Self {
            is_risky: false,
            level: RiskLevel::None,
            reason: String::new(),
            matched_rule: String::new(),
        }
    }

    fn high(reason: String, matched_rule: String) -> Self {
        Self {
            is_risky: true,
            level: RiskLevel::High,
            reason,
            matched_rule,
        }
    }
}

/// A configured pattern with its lower-cased form precomputed.
#[derive(Debug, Clone)]
struct Pattern {
    original: String,
    lowered: String,
}

impl Pattern {
    fn compile(list: &[String]) -> Vec<Pattern> {
        list.iter()
            .map(|p| Pattern {
                original: p.clone(),
                lowered: p.to_lowercase(),
            })
            .collect()
    }

    fn find<'a>(patterns: &'a [Pattern], haystack: &str) -> Option<&'a Pattern> {
        patterns.iter().find(|p| haystack.contains(&p.lowered))
    }
}

/// Deterministic, side-effect-free request classifier.
#[derive(Debug, Clone)]
pub struct RiskDetector {
    enabled: bool,
    risky_methods: Vec<Pattern>,
    risky_keywords: Vec<Pattern>,
    allowed_methods: Vec<Pattern>,
}

impl RiskDetector {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            enabled: config.enabled,
            risky_methods: Pattern::compile(&config.risky_methods),
            risky_keywords: Pattern::compile(&config.risky_keywords),
            allowed_methods: Pattern::compile(&config.allowed_methods),
        }
    }

    /// Classify a request.
    pub fn detect_risk(&self, request: &ProxyRequest) -> RiskVerdict {
        if !self.enabled {
            return RiskVerdict::safe();
        }

        let method = request.method.to_lowercase();
        let allow_listed = Pattern::find(&self.allowed_methods, &method).is_some();

        if !allow_listed {
            if let Some(p) = Pattern::find(&self.risky_methods, &method) {
                return RiskVerdict::high(
                    format!(
                        "method '{}' matches risky pattern '{}'",
                        request.method, p.original
                    ),
                    format!("method:{}", p.original),
                );
            }
        }

        // Map serialization with string keys cannot fail.
        let params = serde_json::to_string(&request.params)
            .unwrap_or_default()
            .to_lowercase();
        if let Some(k) = Pattern::find(&self.risky_keywords, &params) {
            return RiskVerdict::high(
                format!("parameters contain risky keyword '{}'", k.original),
                format!("keyword:{}", k.original),
            );
        }

        RiskVerdict::safe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::TransportMode;
    use serde_json::{Value, json};

    fn request(method: &str, params: Value) -> ProxyRequest {
        let msg = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
        ProxyRequest::from_message(method, None, &msg, "test", TransportMode::Stdio)
    }

    fn detector() -> RiskDetector {
        RiskDetector::new(&RiskConfig::default())
    }

    #[test]
    fn test_safe_request_is_not_risky() {
        let verdict = detector().detect_risk(&request(
            "tools/call",
            json!({"name": "search", "arguments": {"q": "weather in Paris"}}),
        ));
        assert_eq!(verdict, RiskVerdict::safe());
    }

    #[test]
    fn test_risky_method_pattern() {
        let config = RiskConfig {
            risky_methods: vec!["delete".to_string()],
            ..RiskConfig::default()
        };
        let verdict = RiskDetector::new(&config).detect_risk(&request("tools/delete", json!({})));
        assert!(verdict.is_risky);
        assert_eq!(verdict.level, RiskLevel::High);
        assert_eq!(verdict.matched_rule, "method:delete");
    }

    #[test]
    fn test_method_match_is_case_insensitive() {
        let verdict = detector().detect_risk(&request("Tools/DELETE_User", json!({})));
        assert_eq!(verdict.matched_rule, "method:delete");
    }

    #[test]
    fn test_allow_listed_method_still_scans_params() {
        let verdict = detector().detect_risk(&request(
            "resources/read",
            json!({"query": "DROP TABLE users"}),
        ));
        assert!(verdict.is_risky);
        assert_eq!(verdict.matched_rule, "keyword:DROP TABLE");
    }

    #[test]
    fn test_allow_list_skips_method_check() {
        let config = RiskConfig {
            risky_methods: vec!["list".to_string()],
            ..RiskConfig::default()
        };
        let verdict = RiskDetector::new(&config).detect_risk(&request("tools/list", json!({})));
        assert!(!verdict.is_risky);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let verdict = detector().detect_risk(&request(
            "tools/call",
            json!({"arguments": {"cmd": "RM -RF /tmp/x"}}),
        ));
        assert_eq!(verdict.matched_rule, "keyword:rm -rf");
    }

    #[test]
    fn test_method_rule_precedes_keyword_rule() {
        let verdict = detector().detect_risk(&request(
            "tools/delete",
            json!({"sql": "DROP TABLE users"}),
        ));
        assert_eq!(verdict.matched_rule, "method:delete");
    }

    #[test]
    fn test_first_keyword_in_order_wins() {
        let config = RiskConfig {
            risky_keywords: vec!["users".to_string(), "DROP TABLE".to_string()],
            ..RiskConfig::default()
        };
        let verdict = RiskDetector::new(&config)
            .detect_risk(&request("tools/call", json!({"sql": "DROP TABLE users"})));
        assert_eq!(verdict.matched_rule, "keyword:users");
    }

    #[test]
    fn test_disabled_detector_returns_none() {
        let config = RiskConfig {
            enabled: false,
            ..RiskConfig::default()
        };
        let verdict = RiskDetector::new(&config).detect_risk(&request("tools/delete", json!({})));
        assert_eq!(verdict.level, RiskLevel::None);
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }
}
