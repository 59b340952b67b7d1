//! # Shared Bus - Request/Reply Message Bus
//!
//! Every node owns one address on the bus. Each deployed instance of the node
//! registers a [`Consumer`] on that address; requests are spread across the
//! consumers round-robin and answered through a one-shot reply channel.
//!
//! ```text
//! ┌──────────┐  request(address)  ┌──────────────┐   Delivery   ┌────────────┐
//! │  Caller  │ ─────────────────> │  MessageBus  │ ───────────> │ Consumer 1 │
//! │          │                    │ (round-robin)│ ──┐          └────────────┘
//! │          │ <───────────────── │              │   │          ┌────────────┐
//! └──────────┘      Reply         └──────────────┘   └────────> │ Consumer 2 │
//!                                                               └────────────┘
//! ```
//!
//! ## Rules
//!
//! - **Envelope-Only Identity:** the sender of a delivery is set by the bus
//!   caller, never read from the payload.
//! - **Exactly One Reply:** a delivery's reply channel is consumed by the
//!   first reply; a dropped delivery surfaces as [`BusError::NoReply`].
//! - **Bounded Waits:** every request carries a timeout.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod cluster;
pub mod delivery;
pub mod errors;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use cluster::{Cluster, Member};
pub use delivery::{Delivery, ReplySender};
pub use errors::BusError;
pub use publisher::MessageBus;
pub use subscriber::Consumer;

use std::time::Duration;

/// Maximum deliveries buffered per consumer before senders wait.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Request timeout used when the caller does not choose one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

