//! Integration flows.
//!
//! - `flows`: deployment order, routing and replies through a running launcher
//! - `security`: tokens issued by one node and checked by another

pub mod flows;
pub mod security;
