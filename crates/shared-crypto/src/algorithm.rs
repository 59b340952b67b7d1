//! Algorithm identifiers recorded in the token `type` property.

use crate::CryptoError;
use std::fmt;
use std::str::FromStr;

/// Supported token algorithms.
///
/// Support is not trust: which of these a node accepts is decided by its
/// security settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// HMAC with SHA-256.
    HmacSha256,
    /// HMAC with SHA-384.
    HmacSha384,
    /// HMAC with SHA-512.
    HmacSha512,
    /// Ed25519 signatures.
    Ed25519,
    /// ECDSA over secp256k1 with SHA-256.
    EcdsaSecp256k1,
}

impl Algorithm {
    /// Identifier written to the token `type` property.
    pub fn id(self) -> &'static str {
        match self {
            Self::HmacSha256 => "HmacSHA256",
            Self::HmacSha384 => "HmacSHA384",
            Self::HmacSha512 => "HmacSHA512",
            Self::Ed25519 => "Ed25519",
            Self::EcdsaSecp256k1 => "SHA256withECDSA",
        }
    }

    /// True for shared-secret algorithms.
    pub fn is_hmac(self) -> bool {
        matches!(self, Self::HmacSha256 | Self::HmacSha384 | Self::HmacSha512)
    }

    /// True for asymmetric signature algorithms.
    pub fn is_signature(self) -> bool {
        !self.is_hmac()
    }

    /// All supported algorithms.
    pub fn all() -> [Algorithm; 5] {
        [
            Self::HmacSha256,
            Self::HmacSha384,
            Self::HmacSha512,
            Self::Ed25519,
            Self::EcdsaSecp256k1,
        ]
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|algorithm| algorithm.id() == s)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
