//! riskgate core: transport-agnostic request mediation.
//!
//! Classifies MCP JSON-RPC requests by risk, routes risky ones to a human
//! over Slack, and writes one audit record per mediated request. The
//! `riskgate` binary wires this library to a stdio or HTTP downstream.
//!
//! # Layout
//! - [`config`]: YAML schema, env substitution, validation
//! - [`jsonrpc`] and [`request`]: message classification and the mediated request
//! - [`risk`]: rule-based risk detector
//! - [`audit`]: JSONL audit sink
//! - [`approval`]: pending store, manager, Slack notifier and callback receiver
//! - [`mediator`]: per-request decision
//! - [`gateway`]: composition root

pub mod approval;
pub mod audit;
pub mod config;
pub mod error;
pub mod gateway;
pub mod jsonrpc;
pub mod mediator;
pub mod request;
pub mod risk;

pub use error::MediationError;
pub use gateway::{Gateway, GatewayError, GatewayOptions};
pub use mediator::RiskAwareMediator;
pub use request::{ProxyRequest, TransportMode};
