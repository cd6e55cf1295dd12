//! CLI argument types for `riskgate stdio` and `riskgate http`.
//!
//! Defined apart from `main.rs` so integration tests can parse them.

use std::path::PathBuf;

use clap::Args;

use riskgate_core::GatewayOptions;

// ─────────────────────────────────────────────────────────────────────────────
// Shared Options
// ─────────────────────────────────────────────────────────────────────────────

/// Options accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Config file (default: $RISKGATE_CONFIG, ./riskgate.yaml, then the
    /// user config directory).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Approve risky requests automatically after a short delay instead of
    /// asking Slack. For local testing only.
    #[arg(long)]
    pub mock_approvals: bool,
}

impl CommonArgs {
    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            mock_approvals: self.mock_approvals,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stdio Subcommand Args
// ─────────────────────────────────────────────────────────────────────────────

/// Arguments for `riskgate stdio`.
///
/// Spawns the MCP server command and mediates its stdin/stdout.
#[derive(Args, Debug)]
pub struct StdioArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Server command and arguments (after `--`).
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Subcommand Args
// ─────────────────────────────────────────────────────────────────────────────

/// Arguments for `riskgate http`.
///
/// Mediates stdin/stdout against an MCP server reachable over HTTP.
#[derive(Args, Debug)]
pub struct HttpArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// MCP endpoint URL.
    #[arg(long)]
    pub endpoint: String,

    /// Extra request header, `Name: value`. Repeatable.
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

/// Parse a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
