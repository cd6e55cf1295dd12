//! Subprocess transport: relay NDJSON between the client and a child MCP
//! server's stdin/stdout.
//!
//! Three tasks run per session:
//! - client → server: read, mediate, forward or answer
//! - server → client: relay child stdout line-for-line
//! - child stderr: each line logged under the `riskgate::child` target
//!
//! The session ends when the client closes its input, the child exits, a
//! stream fails, or the cancellation token fires. A mediation still parked in
//! an approval wait is then cancelled and given time to write its audit
//! record. The child is stopped with the close-stdin / SIGTERM / SIGKILL
//! sequence.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use riskgate_core::{RiskAwareMediator, TransportMode};

use super::io::{LineWriter, bounded_read_line};
use super::ndjson::MAX_MESSAGE_BYTES;
use super::session::{Session, Step};
use crate::error::{FramingError, TransportError};

/// Time to drain child output after the child has exited.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Time for an in-flight mediation to settle after the session is cancelled.
const MEDIATION_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Target for relayed child stderr lines.
pub const CHILD_LOG_TARGET: &str = "riskgate::child";

/// How to launch and stop the downstream server.
#[derive(Debug, Clone)]
pub struct StdioOptions {
    pub command: String,
    pub args: Vec<String>,
    /// Wait after closing the child's stdin before sending SIGTERM.
    pub stdin_close_grace: Duration,
    /// Wait after SIGTERM before sending SIGKILL.
    pub sigterm_grace: Duration,
}

impl StdioOptions {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            stdin_close_grace: Duration::from_secs(5),
            sigterm_grace: Duration::from_secs(2),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Orchestration
// ─────────────────────────────────────────────────────────────────────────────

/// Proxy the process's own stdin/stdout to a child server.
///
/// Returns the child's exit code.
pub async fn run_stdio(
    opts: StdioOptions,
    mediator: Arc<RiskAwareMediator>,
    cancel: CancellationToken,
) -> Result<i32, TransportError> {
    run_stdio_with(opts, mediator, cancel, tokio::io::stdin(), tokio::io::stdout()).await
}

/// [`run_stdio`] over arbitrary client streams.
///
/// # Errors
///
/// Returns `TransportError::Spawn` if the child cannot be started or its
/// pipes cannot be captured, and `TransportError::Io` if reaping it fails.
pub async fn run_stdio_with<R, W>(
    opts: StdioOptions,
    mediator: Arc<RiskAwareMediator>,
    cancel: CancellationToken,
    client_in: R,
    client_out: W,
) -> Result<i32, TransportError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut child = spawn_server(&opts)?;
    let spawn_err = |pipe: &str| TransportError::Spawn {
        command: opts.command.clone(),
        reason: format!("failed to capture server {pipe}"),
    };
    let child_stdin = child.stdin.take().ok_or_else(|| spawn_err("stdin"))?;
    let child_stdout = child.stdout.take().ok_or_else(|| spawn_err("stdout"))?;
    let child_stderr = child.stderr.take().ok_or_else(|| spawn_err("stderr"))?;

    let client_out = LineWriter::new(client_out);
    // Fires on external shutdown and whenever this session ends.
    let session_cancel = cancel.child_token();
    let session = Session::new(mediator, session_cancel.clone(), TransportMode::Stdio);

    let mut c2s = tokio::spawn(client_to_server(
        session,
        session_cancel.clone(),
        BufReader::new(client_in),
        child_stdin,
        client_out.clone(),
    ));
    let mut s2c = tokio::spawn(server_to_client(BufReader::new(child_stdout), client_out));
    let stderr_task = tokio::spawn(log_server_stderr(BufReader::new(child_stderr)));

    let mut client_done = false;
    let mut server_done = false;

    tokio::select! {
        result = &mut c2s => {
            client_done = true;
            log_task_end("client→server", "client input closed", result);
        }
        result = &mut s2c => {
            server_done = true;
            log_task_end("server→client", "server output closed", result);
        }
        status = child.wait() => match status {
            Ok(status) => info!(?status, "server process exited"),
            Err(e) => error!(error = %e, "failed to wait on server process"),
        },
        _ = cancel.cancelled() => info!("shutdown requested"),
    }

    // The client→server task owns the child's stdin; its end closes it.
    if !client_done {
        session_cancel.cancel();
        match tokio::time::timeout(MEDIATION_SETTLE_TIMEOUT, &mut c2s).await {
            Ok(result) => log_task_end("client→server", "client relay stopped", result),
            Err(_) => {
                warn!("in-flight mediation did not settle, aborting client relay");
                c2s.abort();
                let _ = c2s.await;
            }
        }
    }

    let code = shutdown_server(&mut child, &opts).await?;

    if !server_done {
        match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, s2c).await {
            Ok(result) => log_task_end("server→client", "server output drained", result),
            Err(_) => warn!("server output not drained before timeout"),
        }
    }
    if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, stderr_task).await.is_err() {
        debug!("server stderr not drained before timeout");
    }

    Ok(code)
}

fn spawn_server(opts: &StdioOptions) -> Result<Child, TransportError> {
    let mut cmd = Command::new(&opts.command);
    cmd.args(&opts.args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|e| TransportError::Spawn {
        command: opts.command.clone(),
        reason: e.to_string(),
    })?;
    info!(command = %opts.command, pid = child.id(), "server process spawned");
    Ok(child)
}

fn log_task_end(
    task: &str,
    done: &str,
    result: Result<Result<(), TransportError>, tokio::task::JoinError>,
) {
    match result {
        Ok(Ok(())) => info!(task, "{done}"),
        Ok(Err(e)) => error!(task, error = %e, "task failed"),
        Err(e) if e.is_cancelled() => debug!(task, "task cancelled"),
        Err(e) => error!(task, error = %e, "task panicked"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay Tasks
// ─────────────────────────────────────────────────────────────────────────────

async fn client_to_server<R, D, W>(
    mut session: Session,
    cancel: CancellationToken,
    mut reader: R,
    mut child_stdin: D,
    client_out: LineWriter<W>,
) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
    D: AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = Vec::new();
    loop {
        raw.clear();
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            read = bounded_read_line(&mut reader, &mut raw, MAX_MESSAGE_BYTES) => read,
        };
        match read {
            Ok(0) => return Ok(()),
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
            Step::Forward(line) => {
                child_stdin.write_all(line.as_bytes()).await?;
                child_stdin.write_all(b"\n").await?;
                child_stdin.flush().await?;
            }
            Step::Reply(line) => client_out.write_line(line.as_bytes()).await?,
            Step::Drop => {}
        }
    }
}

async fn server_to_client<R, W>(mut reader: R, client_out: LineWriter<W>) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match bounded_read_line(&mut reader, &mut raw, MAX_MESSAGE_BYTES).await {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(FramingError::MessageTooLarge { max_bytes }) => {
                warn!(max_bytes, "server message exceeded size limit, skipping");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        client_out.write_line(&raw).await?;
    }
}

async fn log_server_stderr<R: AsyncBufRead + Unpin>(reader: R) {
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(target: CHILD_LOG_TARGET, "{line}"),
            Ok(None) => return,
            Err(e) => {
                debug!(error = %e, "server stderr closed");
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shutdown
// ─────────────────────────────────────────────────────────────────────────────

/// Stop the child and collect its exit code.
///
/// 1. stdin is already closed by the caller
/// 2. wait `stdin_close_grace`
/// 3. SIGTERM the process group (Unix)
/// 4. wait `sigterm_grace`
/// 5. SIGKILL
/// 6. reap
async fn shutdown_server(child: &mut Child, opts: &StdioOptions) -> Result<i32, TransportError> {
    match tokio::time::timeout(opts.stdin_close_grace, child.wait()).await {
        Ok(Ok(status)) => {
            let code = status.code().unwrap_or(-1);
            info!(code, "server exited after stdin close");
            return Ok(code);
        }
        Ok(Err(e)) => error!(error = %e, "wait failed after stdin close"),
        Err(_) => info!("server did not exit within stdin close grace"),
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        if let Some(pid) = child.id() {
            info!(pid, "sending SIGTERM to process group");
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!(pid, error = ?e, "killpg SIGTERM failed");
            }
        }
    }

    match tokio::time::timeout(opts.sigterm_grace, child.wait()).await {
        Ok(Ok(status)) => {
            let code = status.code().unwrap_or(-1);
            info!(code, "server exited after SIGTERM");
            return Ok(code);
        }
        Ok(Err(e)) => error!(error = %e, "wait failed after SIGTERM"),
        Err(_) => warn!("server did not exit within SIGTERM grace"),
    }

    warn!("sending SIGKILL");
    if let Err(e) = child.kill().await {
        error!(error = %e, "SIGKILL failed");
    }
    let status = child.wait().await?;
    let code = status.code().unwrap_or(-1);
    info!(code, "server exited after SIGKILL");
    Ok(code)
}
