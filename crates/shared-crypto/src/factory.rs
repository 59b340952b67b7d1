//! # Token Factory
//!
//! Issues and verifies [`Token`]s with either the node's shared secret (HMAC)
//! or a named keystore (signature).
//!
//! ## Verification Order
//!
//! ```text
//! expired? ──yes──> Expired
//!    │
//! has type? ──no──> key present ? MissingAlgorithm : Unsecured
//!    │
//! trusted hmac? ───yes──> constant-time MAC check
//!    │
//! trusted signature? ──yes──> alias -> keystore -> signature check
//!    │
//!    └──> UntrustedAlgorithm
//! ```
//!
//! The token's `type` property is only ever compared against the two trusted
//! algorithms; a token cannot pick the algorithm used to check it.

use crate::keystore::KeystoreSet;
use crate::settings::SecuritySettings;
use crate::{hmac, Algorithm, Clock, CryptoError, SystemClock, TokenError};
use base64::{engine::general_purpose, Engine as _};
use shared_types::token::{PROPERTY_ALIAS, PROPERTY_TYPE};
use shared_types::Token;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Signs and verifies tokens for one node.
#[derive(Clone)]
pub struct TokenFactory {
    secret: Zeroizing<Vec<u8>>,
    hmac_algorithm: Algorithm,
    signature_algorithm: Algorithm,
    token_ttl_secs: u64,
    keystores: Arc<KeystoreSet>,
    clock: Arc<dyn Clock>,
}

impl TokenFactory {
    /// Create a factory for `secret` trusting the algorithms in `settings`.
    ///
    /// Starts with no keystores and the system clock.
    ///
    /// # Errors
    ///
    /// Fails when the configured algorithms are unknown or of the wrong kind.
    pub fn new(secret: &[u8], settings: &SecuritySettings) -> Result<Self, CryptoError> {
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            hmac_algorithm: settings.hmac()?,
            signature_algorithm: settings.signature()?,
            token_ttl_secs: settings.token_ttl_secs,
            keystores: Arc::new(KeystoreSet::new()),
            clock: Arc::new(SystemClock),
        })
    }

    /// Use `keystores` for signing and signature verification.
    #[must_use]
    pub fn with_keystores(mut self, keystores: Arc<KeystoreSet>) -> Self {
        self.keystores = keystores;
        self
    }

    /// Use `clock` for expiry decisions.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the factory clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// The trusted HMAC algorithm.
    pub fn hmac_algorithm(&self) -> Algorithm {
        self.hmac_algorithm
    }

    /// The trusted signature algorithm.
    pub fn signature_algorithm(&self) -> Algorithm {
        self.signature_algorithm
    }

    /// HMAC-sign `token` with the factory secret.
    ///
    /// Sets `type` before canonicalizing so the algorithm is covered by the MAC.
    pub fn hmac(&self, mut token: Token) -> Result<Token, CryptoError> {
        token.add_property(PROPERTY_TYPE, self.hmac_algorithm.id());
        let mac = hmac::sign(self.hmac_algorithm, &self.secret, &token.canonical_bytes())?;
        token.key = general_purpose::STANDARD.encode(mac);
        Ok(token)
    }

    /// Sign `token` with the private key of keystore `alias`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::KeystoreNotFound` - unknown alias
    /// - `CryptoError::MissingPrivateKey` - the keystore can only verify
    /// - `CryptoError::AlgorithmMismatch` - the keystore does not hold keys
    ///   for the trusted signature algorithm
    pub fn sign(&self, mut token: Token, alias: &str) -> Result<Token, CryptoError> {
        let keystore = self
            .keystores
            .get(alias)
            .ok_or_else(|| CryptoError::KeystoreNotFound(alias.to_string()))?;
        if keystore.algorithm() != self.signature_algorithm {
            return Err(CryptoError::AlgorithmMismatch {
                algorithm: keystore.algorithm().id().to_string(),
                operation: "signing under the trusted signature algorithm",
            });
        }
        token.add_property(PROPERTY_TYPE, self.signature_algorithm.id());
        token.add_property(PROPERTY_ALIAS, alias);
        let signature = keystore.sign(&token.canonical_bytes())?;
        token.key = general_purpose::STANDARD.encode(signature);
        Ok(token)
    }

    /// Issue an HMAC token for `domain` valid for the configured lifetime.
    pub fn issue(&self, domain: impl Into<String>) -> Result<Token, CryptoError> {
        let expiry = self.now().saturating_add(self.token_ttl_secs);
        self.hmac(Token::new(domain, expiry))
    }

    /// Verify a possibly absent token.
    pub fn verify_present(&self, token: Option<&Token>) -> Result<(), TokenError> {
        match token {
            Some(token) => self.verify(token),
            None => Err(TokenError::Missing),
        }
    }

    /// Verify `token`. Failures are logged at warn level.
    pub fn verify(&self, token: &Token) -> Result<(), TokenError> {
        let result = self.check(token);
        match &result {
            Ok(()) => debug!(domain = %token.domain, "Token verified"),
            Err(e) => warn!(domain = %token.domain, error = %e, "Token verification failed"),
        }
        result
    }

    fn check(&self, token: &Token) -> Result<(), TokenError> {
        let now = self.now();
        if token.is_expired_at(now) {
            return Err(TokenError::Expired {
                expiry: token.expiry,
                now,
            });
        }

        let Some(algorithm) = token.algorithm() else {
            return Err(if token.is_secured() {
                TokenError::MissingAlgorithm
            } else {
                TokenError::Unsecured
            });
        };

        if algorithm == self.hmac_algorithm.id() {
            let key = decode_key(&token.key)?;
            if hmac::verify(self.hmac_algorithm, &self.secret, &token.canonical_bytes(), &key) {
                Ok(())
            } else {
                Err(TokenError::SignatureVerificationFailed)
            }
        } else if algorithm == self.signature_algorithm.id() {
            let alias = token.alias().ok_or(TokenError::MissingAlias)?;
            let keystore = self
                .keystores
                .get(alias)
                .ok_or_else(|| TokenError::KeystoreNotFound(alias.to_string()))?;
            if keystore.algorithm() != self.signature_algorithm {
                return Err(TokenError::SignatureVerificationFailed);
            }
            let key = decode_key(&token.key)?;
            if keystore.verify(&token.canonical_bytes(), &key) {
                Ok(())
            } else {
                Err(TokenError::SignatureVerificationFailed)
            }
        } else {
            Err(TokenError::UntrustedAlgorithm(algorithm.to_string()))
        }
    }

    /// [`hmac`](Self::hmac) on the blocking pool.
    pub async fn hmac_async(self: &Arc<Self>, token: Token) -> Result<Token, CryptoError> {
        let factory = Arc::clone(self);
        tokio::task::spawn_blocking(move || factory.hmac(token))
            .await
            .map_err(|e| CryptoError::Worker(e.to_string()))?
    }

    /// [`sign`](Self::sign) on the blocking pool.
    pub async fn sign_async(
        self: &Arc<Self>,
        token: Token,
        alias: impl Into<String>,
    ) -> Result<Token, CryptoError> {
        let factory = Arc::clone(self);
        let alias = alias.into();
        tokio::task::spawn_blocking(move || factory.sign(token, &alias))
            .await
            .map_err(|e| CryptoError::Worker(e.to_string()))?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_async(self: &Arc<Self>, token: Token) -> Result<(), TokenError> {
        let factory = Arc::clone(self);
        tokio::task::spawn_blocking(move || factory.verify(&token))
            .await
            .map_err(|e| TokenError::Crypto(CryptoError::Worker(e.to_string())))?
    }
}

fn decode_key(key: &str) -> Result<Vec<u8>, TokenError> {
    general_purpose::STANDARD
        .decode(key)
        .map_err(|_| TokenError::SignatureVerificationFailed)
}

impl fmt::Debug for TokenFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenFactory")
            .field("hmac_algorithm", &self.hmac_algorithm)
            .field("signature_algorithm", &self.signature_algorithm)
            .field("keystores", &self.keystores.len())
            .finish_non_exhaustive()
    }
}
