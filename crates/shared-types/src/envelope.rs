//! # Request and Reply Envelopes
//!
//! Inbound messages are JSON objects with an `action`, an optional `token`
//! and arbitrary payload fields:
//!
//! ```text
//! { "action": "put", "token": { ... }, "key": "a", "value": 1 }
//! ```
//!
//! Replies carry a status and either the payload fields or an error message:
//!
//! ```text
//! { "status": "ACCEPTED", "value": 1 }
//! { "status": "UNAUTHORIZED", "message": "Token has expired" }
//! ```

use crate::errors::EnvelopeError;
use crate::status::ResponseStatus;
use crate::token::Token;
use crate::{ID_ACTION, ID_TOKEN};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured payload document.
pub type Payload = serde_json::Map<String, Value>;

/// Inbound request envelope as received from the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Action name used for routing.
    pub action: String,
    /// Caller token, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
    /// Remaining payload fields.
    #[serde(flatten)]
    pub payload: Payload,
}

impl InboundMessage {
    /// Create a message with no token and an empty payload.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            token: None,
            payload: Payload::new(),
        }
    }

    /// Attach a token.
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    /// Add a payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Decode an envelope, separating `action` and `token` from the payload.
    pub fn from_json(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut payload) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let action = match payload.remove(ID_ACTION) {
            Some(Value::String(action)) => action,
            _ => return Err(EnvelopeError::MissingAction),
        };

        let token = match payload.remove(ID_TOKEN) {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                serde_json::from_value::<Token>(raw)
                    .map_err(|e| EnvelopeError::MalformedToken(e.to_string()))?,
            ),
        };

        Ok(Self {
            action,
            token,
            payload,
        })
    }

    /// Encode back to the JSON wire form.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Reply envelope produced by a request's terminal call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Reply status.
    pub status: ResponseStatus,
    /// Error description for non-accepted replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Payload fields for accepted replies.
    #[serde(flatten)]
    pub payload: Payload,
}

impl Reply {
    /// Success with no payload.
    pub fn accepted() -> Self {
        Self {
            status: ResponseStatus::Accepted,
            message: None,
            payload: Payload::new(),
        }
    }

    /// Success carrying `payload`.
    pub fn with_payload(payload: Payload) -> Self {
        Self {
            status: ResponseStatus::Accepted,
            message: None,
            payload,
        }
    }

    /// Builder-style payload field insertion.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Failure with an explicit status and message.
    pub fn failure(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            payload: Payload::new(),
        }
    }

    /// Check the reply status.
    pub fn is(&self, status: ResponseStatus) -> bool {
        self.status == status
    }

    /// Get a payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Encode to the JSON wire form.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
