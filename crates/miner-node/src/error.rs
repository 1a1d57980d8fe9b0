//! Error types for node communication.
//!
//! None of these stop the miner: a failed call means "no result" for the
//! current round, and the loop tries again later.

use thiserror::Error;

/// Failure of a single JSON-RPC call.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The request never produced a usable HTTP response (connect failure,
    /// timeout, non-JSON HTTP error page).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response arrived but was malformed or incomplete.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The node answered with a JSON-RPC error object.
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}

impl From<miner_core::TemplateError> for RpcError {
    fn from(err: miner_core::TemplateError) -> Self {
        RpcError::Protocol(err.to_string())
    }
}

/// The payout script could not be obtained from the node's wallet.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("getnewaddress failed: {0}")]
    Address(#[source] RpcError),

    #[error("validateaddress failed: {0}")]
    Validate(#[source] RpcError),

    #[error("address {0} has no usable scriptPubKey")]
    MissingScript(String),
}
