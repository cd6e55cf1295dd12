//! Duration parsing for configuration files.
//!
//! Durations are written in `humantime` form: `90s`, `5m`, `1h 30m`.
//! A bare integer is read as seconds.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Parse a duration string.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let trimmed = s.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    humantime::parse_duration(trimmed)
        .map_err(|e| format!("invalid duration '{s}': expected humantime such as 5m ({e})"))
}

/// Deserialize a duration from a string or an integer number of seconds.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(s) => parse_duration(&s).map_err(serde::de::Error::custom),
    }
}

/// Serialize a duration to a humantime string.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_humantime() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h 30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_bare_seconds() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_parse_invalid() {
        let err = parse_duration("soon").unwrap_err();
        assert!(err.contains("invalid duration 'soon'"));
    }
}
