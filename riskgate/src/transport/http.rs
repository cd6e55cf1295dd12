//! HTTP transport: client NDJSON on stdin/stdout, downstream MCP server
//! over HTTP POST.
//!
//! Each forwarded line is POSTed as-is to the endpoint and the response body
//! is written back to the client as one line. Requests are sent one at a
//! time in arrival order.
//!
//! # Response mapping
//!
//! - `202 Accepted` or an empty body: nothing is written (notification ack)
//! - `text/event-stream`: each `data:` payload is written as its own line
//! - JSON body (any status): written as-is with line breaks removed
//! - anything else: a `-32603` error addressed to the request id, or nothing
//!   for notifications
//!
//! No automatic retry, so a tool call never runs twice.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::IgnoredAny;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use riskgate_core::error::JsonRpcErrorResponse;
use riskgate_core::jsonrpc::JsonRpcId;
use riskgate_core::{RiskAwareMediator, TransportMode};

use super::io::{LineWriter, bounded_read_line};
use super::ndjson::{MAX_MESSAGE_BYTES, parse_message};
use super::session::{Session, Step};
use crate::error::{FramingError, TransportError};

/// Downstream endpoint settings.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub endpoint: String,
    /// Extra headers sent with every request, e.g. `Authorization`.
    pub headers: Vec<(String, String)>,
    /// Whole-request timeout, including a long-running tool call.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl HttpOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: Vec::new(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Downstream Client
// ─────────────────────────────────────────────────────────────────────────────

/// POSTs JSON-RPC lines to one MCP endpoint.
pub struct HttpDownstream {
    client: Client,
    endpoint: String,
}

impl HttpDownstream {
    /// # Errors
    ///
    /// Returns `TransportError::InvalidHeader` for a header that is not a
    /// valid HTTP name/value, and `TransportError::HttpClient` if the client
    /// cannot be built.
    pub fn new(opts: &HttpOptions) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &opts.headers {
            let invalid = |reason: String| TransportError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let mut header_value =
                HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            header_value.set_sensitive(true);
            headers.append(header_name, header_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(opts.timeout)
            .connect_timeout(opts.connect_timeout)
            .build()
            .map_err(|e| TransportError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: opts.endpoint.clone(),
        })
    }

    /// Forward one line and map the answer to zero or more client lines.
    ///
    /// Downstream failures become JSON-RPC errors for `id`; they never end
    /// the session.
    pub async fn forward(&self, line: &str, id: Option<&JsonRpcId>) -> Vec<String> {
        let response = match self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header("Accept", "application/json, text/event-stream")
            .body(line.to_string())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "downstream request failed");
                return error_line(id, format!("downstream request failed: {e}"));
            }
        };

        let status = response.status();
        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(%status, error = %e, "failed to read downstream response");
                return error_line(id, format!("failed to read downstream response: {e}"));
            }
        };

        if status == StatusCode::ACCEPTED || body.trim().is_empty() {
            debug!(%status, "downstream returned no body");
            if !status.is_success() {
                return error_line(id, format!("downstream returned HTTP {status}"));
            }
            return Vec::new();
        }

        if is_sse {
            let lines = sse_payloads(&body);
            if !lines.is_empty() {
                return lines;
            }
        }

        match json_line(&body) {
            Some(line) => {
                if !status.is_success() {
                    warn!(%status, "relaying downstream error body");
                }
                vec![line]
            }
            None => {
                warn!(%status, len = body.len(), "downstream returned a non-JSON body");
                error_line(id, format!("downstream returned HTTP {status} without a JSON-RPC body"))
            }
        }
    }
}

impl std::fmt::Debug for HttpDownstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDownstream")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn error_line(id: Option<&JsonRpcId>, detail: String) -> Vec<String> {
    match id {
        Some(id) => vec![JsonRpcErrorResponse::internal(id.clone(), detail).to_line()],
        None => Vec::new(),
    }
}

/// `text` as one NDJSON line, or `None` if it is not a single JSON value.
///
/// The text is validated but never re-serialized, so numbers keep their
/// exact spelling. Raw line breaks can only occur between tokens.
fn json_line(text: &str) -> Option<String> {
    let text = text.trim();
    serde_json::from_str::<IgnoredAny>(text).ok()?;
    Some(text.chars().filter(|c| !matches!(c, '\r' | '\n')).collect())
}

/// JSON payloads of the `data:` fields of an SSE body.
fn sse_payloads(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(json_line)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Proxy the process's own stdin/stdout to an HTTP endpoint.
pub async fn run_http(
    opts: HttpOptions,
    mediator: Arc<RiskAwareMediator>,
    cancel: CancellationToken,
) -> Result<(), TransportError> {
    run_http_with(opts, mediator, cancel, tokio::io::stdin(), tokio::io::stdout()).await
}

/// [`run_http`] over arbitrary client streams.
///
/// Returns when the client closes its input or `cancel` fires.
pub async fn run_http_with<R, W>(
    opts: HttpOptions,
    mediator: Arc<RiskAwareMediator>,
    cancel: CancellationToken,
    client_in: R,
    client_out: W,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let downstream = HttpDownstream::new(&opts)?;
    info!(endpoint = %opts.endpoint, "forwarding to HTTP downstream");

    let mut session = Session::new(mediator, cancel.clone(), TransportMode::Http);
    let mut reader = BufReader::new(client_in);
    let client_out = LineWriter::new(client_out);
    let mut raw = Vec::new();

    loop {
        raw.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("shutdown requested");
                return Ok(());
            }
            read = bounded_read_line(&mut reader, &mut raw, MAX_MESSAGE_BYTES) => read,
        };
        match read {
            Ok(0) => {
                info!("client input closed");
                return Ok(());
            }
            Ok(_) => {}
            Err(FramingError::MessageTooLarge { max_bytes }) => {
                warn!(max_bytes, "client message exceeded size limit, skipping");
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        let Ok(line) = std::str::from_utf8(&raw) else {
            warn!(len = raw.len(), "client message is not valid UTF-8, skipping");
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }

        match session.handle_line(line).await {
            Step::Forward(forward) => {
                // Only requests get a synthesized error; responses and
                // notifications have nobody waiting.
                let id = parse_message(&forward)
                    .ok()
                    .filter(|m| m.method().is_some())
                    .and_then(|m| m.id().cloned());
                for reply in downstream.forward(&forward, id.as_ref()).await {
                    client_out.write_line(reply.as_bytes()).await?;
                }
            }
            Step::Reply(reply) => client_out.write_line(reply.as_bytes()).await?,
            Step::Drop => {}
        }
    }
}
