//! Client-facing transports.
//!
//! The client always speaks NDJSON JSON-RPC on stdin/stdout. The downstream
//! MCP server is either a child process ([`stdio`]) or an HTTP endpoint
//! ([`http`]). Both share the per-line mediation in [`session`].

pub mod http;
pub mod io;
pub mod ndjson;
pub mod session;
pub mod stdio;

pub use http::{HttpDownstream, HttpOptions, run_http, run_http_with};
pub use session::{Session, Step};
pub use stdio::{StdioOptions, run_stdio, run_stdio_with};
