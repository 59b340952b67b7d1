//! # Shared Types Crate
//!
//! Wire-level types shared by every Chorus node.
//!
//! ## Contents
//!
//! - [`Token`]: signed, expiring credential with free-form properties
//! - [`Access`]: ordered authorization tier (`Public < Authorized < Admin`)
//! - [`ResponseStatus`], [`Reply`], [`InboundMessage`]: the request/reply envelopes
//! - [`Protocol`]: the action routing table
//! - [`ProtocolError`]: the routing/authorization error taxonomy
//!
//! ## Design Principles
//!
//! - **Envelope Authority**: the sender of a request comes from the bus
//!   envelope, never from the payload.
//! - **Exact Routing**: actions are looked up by exact match only.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod access;
pub mod envelope;
pub mod errors;
pub mod protocol;
pub mod status;
pub mod token;

pub use access::Access;
pub use envelope::{InboundMessage, Payload, Reply};
pub use errors::{EnvelopeError, ProtocolError};
pub use protocol::{Protocol, Route};
pub use status::ResponseStatus;
pub use token::Token;

/// Envelope field carrying the action name.
pub const ID_ACTION: &str = "action";

/// Envelope field carrying the caller token.
pub const ID_TOKEN: &str = "token";

/// Reply field carrying the status.
pub const ID_STATUS: &str = "status";

/// Reply field carrying an error message.
pub const ID_MESSAGE: &str = "message";
