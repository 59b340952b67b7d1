//! # Keystores
//!
//! A keystore is a named signing identity. It always holds a public key and
//! optionally the private key; nodes that only verify tokens issued elsewhere
//! load the public half alone.
//!
//! Key files contain the base64 encoding of the raw key bytes:
//!
//! | Algorithm | Private key | Public key |
//! |-----------|-------------|------------|
//! | Ed25519 | 32-byte seed | 32-byte point |
//! | SHA256withECDSA | 32-byte scalar | 33-byte compressed SEC1 |

use crate::ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey};
use crate::settings::KeystoreSettings;
use crate::signatures::{Ed25519KeyPair, Ed25519PublicKey};
use crate::{Algorithm, CryptoError};
use base64::{engine::general_purpose, Engine as _};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use zeroize::Zeroizing;

enum Signer {
    Ed25519(Ed25519KeyPair),
    Secp256k1(Secp256k1KeyPair),
}

enum Verifier {
    Ed25519(Ed25519PublicKey),
    Secp256k1(Secp256k1PublicKey),
}

/// A named key pair or trusted public key.
pub struct Keystore {
    alias: String,
    algorithm: Algorithm,
    signer: Option<Signer>,
    verifier: Verifier,
}

impl Keystore {
    /// Generate a fresh key pair.
    pub fn generate(alias: impl Into<String>, algorithm: Algorithm) -> Result<Self, CryptoError> {
        let signer = match algorithm {
            Algorithm::Ed25519 => Signer::Ed25519(Ed25519KeyPair::generate()),
            Algorithm::EcdsaSecp256k1 => Signer::Secp256k1(Secp256k1KeyPair::generate()),
            other => return Err(signature_only(other)),
        };
        Ok(Self::with_signer(alias.into(), algorithm, signer))
    }

    /// Build from raw private key bytes.
    pub fn from_private_key(
        alias: impl Into<String>,
        algorithm: Algorithm,
        bytes: &[u8],
    ) -> Result<Self, CryptoError> {
        let signer = match algorithm {
            Algorithm::Ed25519 => Signer::Ed25519(Ed25519KeyPair::from_bytes(bytes)?),
            Algorithm::EcdsaSecp256k1 => Signer::Secp256k1(Secp256k1KeyPair::from_bytes(bytes)?),
            other => return Err(signature_only(other)),
        };
        Ok(Self::with_signer(alias.into(), algorithm, signer))
    }

    /// Build a verify-only keystore from raw public key bytes.
    pub fn from_public_key(
        alias: impl Into<String>,
        algorithm: Algorithm,
        bytes: &[u8],
    ) -> Result<Self, CryptoError> {
        let verifier = match algorithm {
            Algorithm::Ed25519 => Verifier::Ed25519(Ed25519PublicKey::from_bytes(bytes)?),
            Algorithm::EcdsaSecp256k1 => {
                Verifier::Secp256k1(Secp256k1PublicKey::from_bytes(bytes)?)
            }
            other => return Err(signature_only(other)),
        };
        Ok(Self {
            alias: alias.into(),
            algorithm,
            signer: None,
            verifier,
        })
    }

    /// Load from the key files named in `settings`.
    ///
    /// The private key wins when both files are configured.
    pub fn load(
        alias: &str,
        algorithm: Algorithm,
        settings: &KeystoreSettings,
    ) -> Result<Self, CryptoError> {
        match (&settings.private_key, &settings.public_key) {
            (Some(path), _) => Self::from_private_key(alias, algorithm, &read_key(path)?),
            (None, Some(path)) => Self::from_public_key(alias, algorithm, &read_key(path)?),
            (None, None) => Err(CryptoError::KeyLoad {
                path: alias.to_string(),
                reason: "no key files configured".into(),
            }),
        }
    }

    /// Write the key files named in `settings`.
    pub fn save(&self, settings: &KeystoreSettings) -> Result<(), CryptoError> {
        if let Some(path) = &settings.private_key {
            let private = self
                .private_key_bytes()
                .ok_or_else(|| CryptoError::MissingPrivateKey(self.alias.clone()))?;
            write_key(path, &private)?;
        }
        if let Some(path) = &settings.public_key {
            write_key(path, &self.public_key_bytes())?;
        }
        Ok(())
    }

    fn with_signer(alias: String, algorithm: Algorithm, signer: Signer) -> Self {
        let verifier = match &signer {
            Signer::Ed25519(pair) => Verifier::Ed25519(pair.public_key()),
            Signer::Secp256k1(pair) => Verifier::Secp256k1(pair.public_key()),
        };
        Self {
            alias,
            algorithm,
            signer: Some(signer),
            verifier,
        }
    }

    /// Keystore alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Signature algorithm of the keys.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// True when the private key is present.
    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    /// Sign `data` with the private key.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match &self.signer {
            Some(Signer::Ed25519(pair)) => Ok(pair.sign(data)),
            Some(Signer::Secp256k1(pair)) => Ok(pair.sign(data)),
            None => Err(CryptoError::MissingPrivateKey(self.alias.clone())),
        }
    }

    /// Check `signature` over `data` with the public key.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        match &self.verifier {
            Verifier::Ed25519(key) => key.verify(data, signature),
            Verifier::Secp256k1(key) => key.verify(data, signature),
        }
    }

    /// Raw public key bytes.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        match &self.verifier {
            Verifier::Ed25519(key) => key.to_bytes(),
            Verifier::Secp256k1(key) => key.to_bytes(),
        }
    }

    /// Raw private key bytes, if held.
    pub fn private_key_bytes(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.signer.as_ref().map(|signer| match signer {
            Signer::Ed25519(pair) => pair.to_bytes(),
            Signer::Secp256k1(pair) => pair.to_bytes(),
        })
    }
}

impl fmt::Debug for Keystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keystore")
            .field("alias", &self.alias)
            .field("algorithm", &self.algorithm)
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

fn signature_only(algorithm: Algorithm) -> CryptoError {
    CryptoError::AlgorithmMismatch {
        algorithm: algorithm.id().to_string(),
        operation: "keystore",
    }
}

fn read_key(path: &Path) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let load_error = |reason: String| CryptoError::KeyLoad {
        path: path.display().to_string(),
        reason,
    };
    let text = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?);
    general_purpose::STANDARD
        .decode(text.trim())
        .map(Zeroizing::new)
        .map_err(|e| load_error(e.to_string()))
}

fn write_key(path: &Path, bytes: &[u8]) -> Result<(), CryptoError> {
    std::fs::write(path, general_purpose::STANDARD.encode(bytes)).map_err(|e| CryptoError::KeyLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Keystores by alias.
#[derive(Debug, Default)]
pub struct KeystoreSet {
    keystores: HashMap<String, Keystore>,
}

impl KeystoreSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keystore, replacing any with the same alias.
    pub fn insert(&mut self, keystore: Keystore) {
        self.keystores.insert(keystore.alias.clone(), keystore);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, keystore: Keystore) -> Self {
        self.insert(keystore);
        self
    }

    /// Keystore for `alias`.
    pub fn get(&self, alias: &str) -> Option<&Keystore> {
        self.keystores.get(alias)
    }

    /// Number of keystores.
    pub fn len(&self) -> usize {
        self.keystores.len()
    }

    /// True when no keystore is loaded.
    pub fn is_empty(&self) -> bool {
        self.keystores.is_empty()
    }
}
