//! Bus error types.

use shared_types::ResponseStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Nothing is consuming the address.
    #[error("No handlers for address {address}")]
    NoHandlers {
        /// Target address
        address: String,
    },

    /// No reply arrived within the request timeout.
    #[error("Request to {address} timed out after {timeout:?}")]
    Timeout {
        /// Target address
        address: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// The delivery was dropped without a reply.
    #[error("Request to {address} was dropped without a reply")]
    NoReply {
        /// Target address
        address: String,
    },

    /// The bus is not part of a cluster.
    #[error("Bus is not clustered")]
    NotClustered,

    /// A member with this id is already joined.
    #[error("Member {0} already joined")]
    AlreadyJoined(String),

    /// A cluster cannot be formed without a pre-shared secret.
    #[error("Cluster pre-shared secret is empty")]
    EmptySecret,

    /// The joining member presented the wrong pre-shared secret.
    #[error("Member {0} rejected: invalid pre-shared secret")]
    Rejected(String),
}

impl BusError {
    /// Wire status reported to callers for this error.
    pub fn status(&self) -> ResponseStatus {
        match self {
            Self::NoHandlers { .. } => ResponseStatus::Missing,
            Self::Rejected(_) => ResponseStatus::Unauthorized,
            Self::AlreadyJoined(_) => ResponseStatus::Conflict,
            _ => ResponseStatus::Error,
        }
    }
}
