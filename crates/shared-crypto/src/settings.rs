//! Security settings: which algorithms are trusted and where keys live.

use crate::keystore::{Keystore, KeystoreSet};
use crate::{Algorithm, CryptoError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Key file locations for one keystore alias.
///
/// Both files hold base64 encoded raw key bytes. A keystore with only a
/// public key can verify but not sign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreSettings {
    /// Base64 private key file.
    pub private_key: Option<PathBuf>,
    /// Base64 public key file. Derived from the private key when absent.
    pub public_key: Option<PathBuf>,
}

/// Token trust configuration.
///
/// Read-only once loaded; shared behind an `Arc` by every token factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Trusted shared-secret algorithm.
    pub hmac_algorithm: String,
    /// Trusted signature algorithm.
    pub signature_algorithm: String,
    /// Size of generated secrets in bytes.
    pub secret_bytes: usize,
    /// Lifetime of issued tokens in seconds.
    pub token_ttl_secs: u64,
    /// Keystores by alias.
    pub keystores: BTreeMap<String, KeystoreSettings>,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            hmac_algorithm: Algorithm::HmacSha512.id().to_string(),
            signature_algorithm: Algorithm::Ed25519.id().to_string(),
            secret_bytes: 64,
            token_ttl_secs: 60 * 60 * 24 * 365,
            keystores: BTreeMap::new(),
        }
    }
}

impl SecuritySettings {
    /// The trusted HMAC algorithm.
    ///
    /// # Errors
    ///
    /// Fails when the configured identifier is unknown or not an HMAC.
    pub fn hmac(&self) -> Result<Algorithm, CryptoError> {
        let algorithm: Algorithm = self.hmac_algorithm.parse()?;
        if !algorithm.is_hmac() {
            return Err(CryptoError::AlgorithmMismatch {
                algorithm: self.hmac_algorithm.clone(),
                operation: "hmac",
            });
        }
        Ok(algorithm)
    }

    /// The trusted signature algorithm.
    ///
    /// # Errors
    ///
    /// Fails when the configured identifier is unknown or not a signature.
    pub fn signature(&self) -> Result<Algorithm, CryptoError> {
        let algorithm: Algorithm = self.signature_algorithm.parse()?;
        if !algorithm.is_signature() {
            return Err(CryptoError::AlgorithmMismatch {
                algorithm: self.signature_algorithm.clone(),
                operation: "signature",
            });
        }
        Ok(algorithm)
    }

    /// Check both algorithm identifiers.
    pub fn validate(&self) -> Result<(), CryptoError> {
        self.hmac()?;
        self.signature()?;
        Ok(())
    }

    /// Load every configured keystore for the trusted signature algorithm.
    pub fn load_keystores(&self) -> Result<KeystoreSet, CryptoError> {
        let algorithm = self.signature()?;
        let mut set = KeystoreSet::new();
        for (alias, settings) in &self.keystores {
            set.insert(Keystore::load(alias, algorithm, settings)?);
        }
        Ok(set)
    }
}
