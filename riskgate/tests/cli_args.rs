//! CLI argument parsing tests.

use clap::{Parser, Subcommand};

use riskgate::cli::{HttpArgs, StdioArgs, parse_header};

// ─────────────────────────────────────────────────────────────────────────────
// Test Harness
// ─────────────────────────────────────────────────────────────────────────────

/// Mirrors main.rs's Cli.
#[derive(Parser)]
#[command(name = "riskgate")]
struct TestCli {
    #[command(subcommand)]
    command: TestCommands,
}

#[derive(Subcommand)]
enum TestCommands {
    Stdio(StdioArgs),
    Http(HttpArgs),
}

fn parse(args: &[&str]) -> Result<TestCli, clap::Error> {
    TestCli::try_parse_from(args)
}

// ─────────────────────────────────────────────────────────────────────────────
// StdioArgs Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_stdio_defaults() {
    let cli = parse(&["riskgate", "stdio", "--", "npx", "-y", "server-fs", "/tmp"]).unwrap();
    match cli.command {
        TestCommands::Stdio(args) => {
            assert!(args.common.config.is_none());
            assert!(!args.common.verbose);
            assert!(!args.common.mock_approvals);
            assert_eq!(args.command, vec!["npx", "-y", "server-fs", "/tmp"]);
        }
        TestCommands::Http(_) => panic!("expected Stdio command"),
    }
}

#[test]
fn test_stdio_all_options() {
    let cli = parse(&[
        "riskgate",
        "stdio",
        "--config",
        "/etc/riskgate.yaml",
        "--verbose",
        "--mock-approvals",
        "--",
        "python",
        "server.py",
        "--verbose",
    ])
    .unwrap();
    match cli.command {
        TestCommands::Stdio(args) => {
            assert_eq!(
                args.common.config.as_deref(),
                Some(std::path::Path::new("/etc/riskgate.yaml"))
            );
            assert!(args.common.verbose);
            assert!(args.common.gateway_options().mock_approvals);
            // Flags after `--` belong to the server.
            assert_eq!(args.command, vec!["python", "server.py", "--verbose"]);
        }
        TestCommands::Http(_) => panic!("expected Stdio command"),
    }
}

#[test]
fn test_stdio_requires_command() {
    assert!(parse(&["riskgate", "stdio"]).is_err());
}

// ─────────────────────────────────────────────────────────────────────────────
// HttpArgs Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_http_with_headers() {
    let cli = parse(&[
        "riskgate",
        "http",
        "--endpoint",
        "https://mcp.example.com/mcp",
        "--header",
        "Authorization: Bearer abc:def",
        "-H",
        "X-Team:ops",
    ])
    .unwrap();
    match cli.command {
        TestCommands::Http(args) => {
            assert_eq!(args.endpoint, "https://mcp.example.com/mcp");
            assert_eq!(
                args.headers,
                vec![
                    ("Authorization".to_string(), "Bearer abc:def".to_string()),
                    ("X-Team".to_string(), "ops".to_string()),
                ]
            );
        }
        TestCommands::Stdio(_) => panic!("expected Http command"),
    }
}

#[test]
fn test_http_requires_endpoint() {
    assert!(parse(&["riskgate", "http"]).is_err());
}

#[test]
fn test_http_rejects_malformed_header() {
    assert!(
        parse(&[
            "riskgate",
            "http",
            "--endpoint",
            "http://localhost:3000",
            "--header",
            "no-colon"
        ])
        .is_err()
    );
}

#[test]
fn test_parse_header() {
    assert_eq!(
        parse_header("  Accept :  application/json "),
        Ok(("Accept".to_string(), "application/json".to_string()))
    );
    assert!(parse_header(": value").is_err());
    assert!(parse_header("novalue").is_err());
}
