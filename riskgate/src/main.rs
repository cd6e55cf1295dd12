//! riskgate CLI entry point.
//!
//! `stdio` spawns an MCP server and mediates its stdin/stdout; `http`
//! mediates stdin/stdout against an MCP server's HTTP endpoint.

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use riskgate::cli::{CommonArgs, HttpArgs, StdioArgs};
use riskgate::error::TransportError;
use riskgate::transport::{HttpOptions, StdioOptions, run_http, run_stdio};
use riskgate_core::Gateway;
use riskgate_core::config::load_and_validate;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Definitions
// ─────────────────────────────────────────────────────────────────────────────

/// riskgate: human-in-the-loop approval proxy for MCP servers.
#[derive(Parser)]
#[command(name = "riskgate", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Proxy a stdio MCP server: `riskgate stdio -- <cmd> [args...]`.
    Stdio(StdioArgs),
    /// Proxy an HTTP MCP server.
    Http(HttpArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (name, result) = match cli.command {
        Commands::Stdio(args) => {
            init_tracing(args.common.verbose);
            ("stdio", run_stdio_command(args).await)
        }
        Commands::Http(args) => {
            init_tracing(args.common.verbose);
            ("http", run_http_command(args).await.map(|()| 0))
        }
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "{name} proxy failed");
            eprintln!("riskgate {name}: {e}");
            1
        }
    };
    std::process::exit(code);
}

async fn run_stdio_command(args: StdioArgs) -> Result<i32, TransportError> {
    let Some((command, server_args)) = args.command.split_first() else {
        return Err(TransportError::Spawn {
            command: String::new(),
            reason: "no server command specified".to_string(),
        });
    };
    let opts = StdioOptions::new(command.clone(), server_args.to_vec());

    let gateway = start_gateway(&args.common).await?;
    let result = run_stdio(opts, gateway.mediator(), gateway.cancel_token()).await;
    gateway.shutdown().await?;
    result
}

async fn run_http_command(args: HttpArgs) -> Result<(), TransportError> {
    let mut opts = HttpOptions::new(args.endpoint);
    opts.headers = args.headers;

    let gateway = start_gateway(&args.common).await?;
    let result = run_http(opts, gateway.mediator(), gateway.cancel_token()).await;
    gateway.shutdown().await?;
    result
}

async fn start_gateway(common: &CommonArgs) -> Result<Gateway, TransportError> {
    let config = load_and_validate(common.config.as_deref())?;
    let gateway = Gateway::from_config(&config, common.gateway_options()).await?;
    setup_signal_handlers(gateway.cancel_token());
    Ok(gateway)
}

// ─────────────────────────────────────────────────────────────────────────────
// Signals
// ─────────────────────────────────────────────────────────────────────────────

/// Cancel `shutdown` on SIGINT or SIGTERM.
fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_sigint = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received SIGINT (Ctrl+C), shutting down");
                shutdown_sigint.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for SIGINT"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, shutting down");
                shutdown.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for SIGTERM"),
        }
    });

    #[cfg(not(unix))]
    let _ = shutdown;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracing Init
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise the tracing subscriber on stderr; stdout carries protocol
/// traffic.
///
/// `verbose` forces `debug`. Otherwise `RUST_LOG` applies, defaulting to
/// `info`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
