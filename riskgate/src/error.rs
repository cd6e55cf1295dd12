//! Error types for the transports and CLI.
//!
//! `FramingError` covers a single bad NDJSON line. The session logs it and
//! moves on. `TransportError` ends the session.

use riskgate_core::GatewayError;
use riskgate_core::config::ConfigError;

/// Errors that can occur when parsing one NDJSON-framed JSON-RPC message.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// A single line exceeds the maximum message size.
    ///
    /// Checked before JSON parsing.
    #[error("Message exceeds maximum size of {max_bytes} bytes")]
    MessageTooLarge { max_bytes: usize },

    /// The line is not valid JSON, or its structure is invalid for JSON-RPC.
    #[error("Malformed JSON: {reason}")]
    MalformedJson { reason: String },

    #[error("Missing required jsonrpc field")]
    MissingVersion,

    #[error("Unsupported JSON-RPC version: {version}")]
    UnsupportedVersion { version: String },

    /// MCP does not use JSON-RPC batches.
    #[error("JSON-RPC batch requests (arrays) are not supported")]
    UnsupportedBatch,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that end a proxy session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The downstream server process failed to start.
    #[error("Server process '{command}' failed to start: {reason}")]
    Spawn { command: String, reason: String },

    /// A `--header` value could not be turned into an HTTP header.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Client or downstream stream failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FramingError> for TransportError {
    fn from(e: FramingError) -> Self {
        match e {
            FramingError::Io(io) => Self::Io(io),
            other => Self::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                other.to_string(),
            )),
        }
    }
}
