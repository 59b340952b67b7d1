//! # Request
//!
//! One inbound message together with its single-use reply channel.
//!
//! ```text
//!            accept / write / error / missing / conflict / unauthorized
//!  Pending ─────────────────────────────────────────────────────────────> Replied
//!                                                                          │
//!                       any later terminal call: AlreadyReplied (warn) <───┘
//! ```
//!
//! A request dropped without a reply closes the channel and the caller
//! sees `BusError::NoReply`.

use crate::errors::NodeError;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared_bus::{Delivery, ReplySender};
use shared_types::{Access, InboundMessage, Payload, Reply, ResponseStatus, Token};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Result of a terminal call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The reply was delivered.
    Sent,
    /// A reply was already sent; nothing was delivered.
    AlreadyReplied,
    /// The caller stopped waiting before the reply.
    CallerGone,
}

struct RequestInner {
    id: Uuid,
    target: String,
    sender: String,
    message: InboundMessage,
    timeout: Duration,
    access: Access,
    reply: Mutex<Option<ReplySender>>,
}

/// Inbound request handed to a handler.
///
/// Clones share the reply channel, so exactly one reply is delivered no
/// matter which clone replies.
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestInner>,
}

impl Request {
    /// Wrap a bus delivery; `access` is the level granted to its token.
    pub fn from_delivery(delivery: Delivery, access: Access) -> Self {
        Self {
            inner: Arc::new(RequestInner {
                id: delivery.id,
                target: delivery.address,
                sender: delivery.sender,
                message: delivery.message,
                timeout: delivery.timeout,
                access,
                reply: Mutex::new(Some(delivery.reply)),
            }),
        }
    }

    /// Delivery id.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Action name used for routing.
    pub fn action(&self) -> &str {
        &self.inner.message.action
    }

    /// Address the request was sent to.
    pub fn target(&self) -> &str {
        &self.inner.target
    }

    /// Sender identity from the bus envelope.
    pub fn sender(&self) -> &str {
        &self.inner.sender
    }

    /// Caller token, if any.
    pub fn token(&self) -> Option<&Token> {
        self.inner.message.token.as_ref()
    }

    /// Payload fields.
    pub fn payload(&self) -> &Payload {
        &self.inner.message.payload
    }

    /// Time the caller waits for a reply.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Access level granted to the caller.
    pub fn access(&self) -> Access {
        self.inner.access
    }

    /// Raw payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.inner.message.payload.get(key)
    }

    /// String payload field.
    ///
    /// # Errors
    ///
    /// `NodeError::InvalidField` when absent or not a string.
    pub fn text(&self, key: &str) -> Result<&str, NodeError> {
        self.field(key)
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::InvalidField(key.to_string()))
    }

    /// Payload field decoded as `T`.
    pub fn decode<T: DeserializeOwned>(&self, key: &str) -> Result<T, NodeError> {
        let value = self
            .field(key)
            .cloned()
            .ok_or_else(|| NodeError::InvalidField(key.to_string()))?;
        serde_json::from_value(value).map_err(|_| NodeError::InvalidField(key.to_string()))
    }

    /// True once a terminal call was made.
    pub fn is_replied(&self) -> bool {
        self.inner.reply.lock().is_none()
    }

    /// Reply `ACCEPTED` with no payload.
    pub fn accept(&self) -> ReplyOutcome {
        self.reply(Reply::accepted())
    }

    /// Reply `ACCEPTED` with `payload`.
    pub fn write(&self, payload: Payload) -> ReplyOutcome {
        self.reply(Reply::with_payload(payload))
    }

    /// Reply with the status mapped from `error`.
    pub fn error(&self, error: &NodeError) -> ReplyOutcome {
        self.reply(Reply::failure(error.status(), error.to_string()))
    }

    /// Reply `MISSING`.
    pub fn missing(&self) -> ReplyOutcome {
        let message = format!("Nothing found for action '{}'", self.action());
        self.reply(Reply::failure(ResponseStatus::Missing, message))
    }

    /// Reply `CONFLICT`.
    pub fn conflict(&self) -> ReplyOutcome {
        let message = format!("Action '{}' conflicts with existing state", self.action());
        self.reply(Reply::failure(ResponseStatus::Conflict, message))
    }

    /// Reply `UNAUTHORIZED`.
    pub fn unauthorized(&self) -> ReplyOutcome {
        let message = format!("Not authorized for action '{}'", self.action());
        self.reply(Reply::failure(ResponseStatus::Unauthorized, message))
    }

    /// Deliver `reply` if this is the first terminal call.
    pub fn reply(&self, reply: Reply) -> ReplyOutcome {
        let Some(sender) = self.inner.reply.lock().take() else {
            warn!(
                id = %self.inner.id,
                action = %self.action(),
                status = %reply.status,
                "Request already replied, dropping reply"
            );
            return ReplyOutcome::AlreadyReplied;
        };

        debug!(id = %self.inner.id, status = %reply.status, "Replying");
        match sender.send(reply) {
            Ok(()) => ReplyOutcome::Sent,
            Err(_) => {
                debug!(id = %self.inner.id, "Caller stopped waiting");
                ReplyOutcome::CallerGone
            }
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.inner.id)
            .field("action", &self.action())
            .field("target", &self.inner.target)
            .field("sender", &self.inner.sender)
            .field("access", &self.inner.access)
            .finish_non_exhaustive()
    }
}
