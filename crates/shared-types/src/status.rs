//! Reply status codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status carried by every reply envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    /// Request handled.
    Accepted,
    /// Generic failure.
    Error,
    /// Caller lacks the required access or presented an invalid token.
    Unauthorized,
    /// No handler for the requested action or resource.
    Missing,
    /// Request conflicts with existing state.
    Conflict,
}

impl ResponseStatus {
    /// True for `Accepted`.
    pub fn is_success(self) -> bool {
        self == ResponseStatus::Accepted
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseStatus::Accepted => "ACCEPTED",
            ResponseStatus::Error => "ERROR",
            ResponseStatus::Unauthorized => "UNAUTHORIZED",
            ResponseStatus::Missing => "MISSING",
            ResponseStatus::Conflict => "CONFLICT",
        };
        f.write_str(name)
    }
}
