//! Line-oriented I/O shared by every transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::FramingError;

/// Upper bound on skipping the tail of an oversized line.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────────────────
// Bounded Line Reading
// ─────────────────────────────────────────────────────────────────────────────

/// Read one line into `buf`, enforcing a byte limit.
///
/// Bytes are accumulated raw so multi-byte UTF-8 sequences split across
/// internal buffer boundaries survive. On overflow the rest of the line is
/// drained so the next call starts at a line boundary.
///
/// # Returns
///
/// - `Ok(n)` where `n > 0`: a line (with its newline, if any) is in `buf`
/// - `Ok(0)`: EOF
/// - `Err(FramingError::MessageTooLarge)`: the line exceeded `max_bytes`
/// - `Err(FramingError::Io)`: underlying I/O error
pub async fn bounded_read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> Result<usize, FramingError> {
    let mut total = 0usize;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(total);
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let to_consume = pos + 1;
                if total + to_consume > max_bytes {
                    reader.consume(to_consume);
                    return Err(FramingError::MessageTooLarge { max_bytes });
                }
                buf.extend_from_slice(&available[..to_consume]);
                total += to_consume;
                reader.consume(to_consume);
                return Ok(total);
            }
            None => {
                let len = available.len();
                if total + len > max_bytes {
                    reader.consume(len);
                    drain_until_newline(reader).await;
                    return Err(FramingError::MessageTooLarge { max_bytes });
                }
                buf.extend_from_slice(available);
                total += len;
                reader.consume(len);
            }
        }
    }
}

async fn drain_until_newline<R: AsyncBufRead + Unpin>(reader: &mut R) {
    let drain = async {
        loop {
            match reader.fill_buf().await {
                Ok([]) => return,
                Ok(buf) => {
                    if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        reader.consume(pos + 1);
                        return;
                    }
                    let len = buf.len();
                    reader.consume(len);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "IO error while draining oversized message");
                    return;
                }
            }
        }
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("gave up draining oversized message");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serialized Line Writer
// ─────────────────────────────────────────────────────────────────────────────

/// Shared writer that emits whole lines.
///
/// Both directions of a session write to the client; the mutex keeps their
/// lines from interleaving.
pub struct LineWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for LineWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write `line` followed by a newline (unless it already ends with one)
    /// and flush.
    pub async fn write_line(&self, line: &[u8]) -> std::io::Result<()> {
        let mut guard = self.inner.lock().await;
        guard.write_all(line).await?;
        if line.last() != Some(&b'\n') {
            guard.write_all(b"\n").await?;
        }
        guard.flush().await
    }
}
