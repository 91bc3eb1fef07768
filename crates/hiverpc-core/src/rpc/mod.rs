//! JSON-RPC transport layer.
//!
//! Defines the [`Transport`] trait (one HTTP POST to one node) with a
//! `reqwest` implementation ([`HttpTransport`]) and a test mock
//! (`mock::MockTransport`). [`RpcClient`] sits on top of a transport and adds
//! JSON-RPC envelopes, response validation, node rotation and retry.

mod client;
mod http;
#[cfg(test)]
pub mod mock;
mod nodes;
pub mod protocol;

pub use client::{Retry, RpcClient};
pub use http::HttpTransport;
pub use nodes::NodePool;
pub use protocol::{CallStyle, JsonRpcRequest};

use async_trait::async_trait;

use crate::error::CoreError;

/// One request/response exchange with a single node.
///
/// Implementations report HTTP-level failures (connection errors, timeouts,
/// non-2xx statuses) as [`CoreError::Transport`] and return the raw body
/// otherwise; JSON decoding and JSON-RPC error handling happen above this
/// trait so every transport behaves the same.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, node: &str, body: &str) -> Result<String, CoreError>;

    /// Called when a session scope opens. Transports that pool connections
    /// keep them alive until the matching [`Transport::exit_session`].
    fn enter_session(&self) {}

    fn exit_session(&self) {}
}
