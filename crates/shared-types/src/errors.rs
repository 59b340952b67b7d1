//! # Error Types
//!
//! Routing, authorization and envelope errors, with their wire status.

use crate::access::Access;
use crate::status::ResponseStatus;
use thiserror::Error;

/// Errors raised while resolving a route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// No route registered for the action.
    #[error("Handler missing for action '{action}'")]
    RouteNotFound { action: String },

    /// The caller's access level is below the route's minimum.
    #[error("Authorization required: action '{action}' requires {required}, caller has {provided}")]
    AuthorizationRequired {
        action: String,
        required: Access,
        provided: Access,
    },
}

impl ProtocolError {
    /// Wire status for this error.
    pub fn status(&self) -> ResponseStatus {
        match self {
            Self::RouteNotFound { .. } => ResponseStatus::Missing,
            Self::AuthorizationRequired { .. } => ResponseStatus::Unauthorized,
        }
    }
}

/// Errors raised while decoding an inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The envelope is not a JSON object.
    #[error("Envelope must be a JSON object")]
    NotAnObject,

    /// The envelope has no string `action` field.
    #[error("Envelope is missing field 'action'")]
    MissingAction,

    /// The `token` field could not be decoded.
    #[error("Envelope token is malformed: {0}")]
    MalformedToken(String),
}
