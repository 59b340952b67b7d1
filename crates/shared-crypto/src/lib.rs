//! # Shared Crypto - Token Signing and Verification
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hmac` | HMAC-SHA256/384/512 | Shared-secret tokens |
//! | `signatures` | Ed25519 | Asymmetric tokens |
//! | `ecdsa` | secp256k1 | Asymmetric tokens |
//! | `keystore` | - | Named key pairs / trusted public keys |
//! | `factory` | - | Token issue and verification |
//!
//! ## Security Properties
//!
//! - The algorithm named in a token is only honoured when it matches one of
//!   the server's trusted algorithms; it never selects code paths on its own.
//! - HMAC comparison is constant-time.
//! - Signing input is canonicalized in a fixed order (see
//!   [`shared_types::Token::canonical_bytes`]).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod algorithm;
pub mod clock;
pub mod ecdsa;
pub mod errors;
pub mod factory;
pub mod hmac;
pub mod keystore;
pub mod secrets;
pub mod settings;
pub mod signatures;

// Re-exports
pub use algorithm::Algorithm;
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{CryptoError, TokenError};
pub use factory::TokenFactory;
pub use keystore::{Keystore, KeystoreSet};
pub use secrets::SecretFactory;
pub use settings::{KeystoreSettings, SecuritySettings};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
