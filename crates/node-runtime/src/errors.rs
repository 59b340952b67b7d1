//! Errors raised while handling requests or running a node.

use crate::storage::StorageError;
use shared_bus::BusError;
use shared_crypto::{CryptoError, TokenError};
use shared_types::{ProtocolError, ResponseStatus};
use thiserror::Error;

/// Node and request handling errors.
///
/// Handlers return these from `handle`; the request boundary turns them
/// into a reply with [`NodeError::status`].
#[derive(Debug, Error)]
pub enum NodeError {
    /// Routing or authorization failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Token verification failure.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Crypto primitive failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Bus failure while calling another node.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A required payload field is absent or has the wrong type.
    #[error("Missing or invalid field '{0}'")]
    InvalidField(String),

    /// The node needs a clustered bus.
    #[error("Node {0} requires a clustered bus")]
    ClusterRequired(String),

    /// A blocking task panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// Handler-specific failure.
    #[error("{0}")]
    Handler(String),
}

impl NodeError {
    /// Wire status for this error.
    pub fn status(&self) -> ResponseStatus {
        match self {
            Self::Protocol(e) => e.status(),
            Self::Token(e) => e.status(),
            Self::Storage(e) => e.status(),
            Self::Bus(e) => e.status(),
            _ => ResponseStatus::Error,
        }
    }

    /// True when the action has no route.
    pub fn is_handler_missing(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::RouteNotFound { .. }))
    }
}

impl From<&NodeError> for ResponseStatus {
    fn from(error: &NodeError) -> Self {
        error.status()
    }
}
