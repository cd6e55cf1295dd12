//! riskgate: human-in-the-loop approval proxy for MCP servers.
//!
//! Sits between an MCP client and a server, classifies every request by
//! risk, and holds risky ones until a human approves them in Slack.

pub mod cli;
pub mod error;
pub mod transport;
