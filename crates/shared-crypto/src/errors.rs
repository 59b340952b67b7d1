//! Crypto and token error types.

use shared_types::ResponseStatus;
use thiserror::Error;

/// Cryptographic operation errors.
///
/// These are failures of the primitives themselves (unknown algorithm, bad
/// key material) and are fatal to the operation that raised them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Algorithm identifier is not implemented.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Algorithm is implemented but of the wrong kind for the operation.
    #[error("Algorithm {algorithm} cannot be used for {operation}")]
    AlgorithmMismatch {
        /// Algorithm identifier
        algorithm: String,
        /// Operation attempted
        operation: &'static str,
    },

    /// No keystore registered under the alias.
    #[error("Keystore not found: {0}")]
    KeystoreNotFound(String),

    /// The keystore only holds a public key.
    #[error("Keystore {0} has no private key")]
    MissingPrivateKey(String),

    /// Invalid key length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Key material could not be read.
    #[error("Failed to load key {path}: {reason}")]
    KeyLoad {
        /// File that failed
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// Base64 input could not be decoded.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// The blocking worker running the operation failed.
    #[error("Crypto worker failed: {0}")]
    Worker(String),
}

/// Token verification failures.
///
/// Everything except `Crypto` is an expected, operational outcome and maps to
/// an `UNAUTHORIZED` reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// No token was presented.
    #[error("Token is missing")]
    Missing,

    /// `now >= expiry`.
    #[error("Token expired at {expiry} (now {now})")]
    Expired {
        /// Token expiry
        expiry: u64,
        /// Verification time
        now: u64,
    },

    /// The token has neither a key nor an algorithm.
    #[error("Token is not secured")]
    Unsecured,

    /// The token has a key but no `type` property.
    #[error("Token is missing property 'type' - unable to verify")]
    MissingAlgorithm,

    /// The token's algorithm is not currently trusted.
    #[error("Token algorithm '{0}' - not enabled/trusted")]
    UntrustedAlgorithm(String),

    /// A signature token has no `alias` property.
    #[error("Token is missing property 'alias' - unable to verify")]
    MissingAlias,

    /// The alias does not name a trusted keystore.
    #[error("Keystore not found: {0}")]
    KeystoreNotFound(String),

    /// HMAC or signature mismatch.
    #[error("Token signature verification failed")]
    SignatureVerificationFailed,

    /// Primitive failure while verifying.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl TokenError {
    /// Wire status for this error.
    pub fn status(&self) -> ResponseStatus {
        match self {
            Self::Crypto(_) => ResponseStatus::Error,
            _ => ResponseStatus::Unauthorized,
        }
    }
}
