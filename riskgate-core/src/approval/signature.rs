//! Slack request signing.
//!
//! Slack signs each interaction callback with
//! `v0=hex(HMAC-SHA256(signing_secret, "v0:" + timestamp + ":" + body))`.
//! Requests whose timestamp is more than [`MAX_CALLBACK_SKEW_SECS`] away from
//! the local clock are rejected even when the HMAC is correct.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::defaults::MAX_CALLBACK_SKEW_SECS;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request timestamp (Unix seconds).
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
/// Header carrying the `v0=` signature.
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

const VERSION: &str = "v0";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing {header} header")]
    MissingHeader { header: &'static str },

    #[error("invalid request timestamp")]
    InvalidTimestamp,

    #[error("request timestamp is {skew}s away from local time")]
    StaleTimestamp { skew: i64 },

    #[error("signature mismatch")]
    Mismatch,

    #[error("signing secret rejected by HMAC")]
    InvalidKey,
}

/// Verifies inbound callback signatures against a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    max_skew_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            max_skew_secs: MAX_CALLBACK_SKEW_SECS,
        }
    }

    /// Verify a callback at the current time.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        self.verify_at(timestamp, signature, body, chrono::Utc::now().timestamp())
    }

    /// Verify a callback as of `now` (Unix seconds).
    pub fn verify_at(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingHeader {
            header: TIMESTAMP_HEADER,
        })?;
        let signature = signature.ok_or(SignatureError::MissingHeader {
            header: SIGNATURE_HEADER,
        })?;

        let ts: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        let skew = now.saturating_sub(ts).saturating_abs();
        if skew > self.max_skew_secs {
            return Err(SignatureError::StaleTimestamp { skew });
        }

        let expected = sign(&self.secret, timestamp, body)?;
        if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .field("max_skew_secs", &self.max_skew_secs)
            .finish()
    }
}

/// Compute the `v0=` signature for a body.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(format!(
        "{VERSION}={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}
