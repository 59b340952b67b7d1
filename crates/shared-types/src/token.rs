//! # Access Token
//!
//! A token carries a domain, an absolute expiry and free-form properties.
//! The `key` holds the base64 HMAC or signature produced by a token factory;
//! an empty key marks an unsecured token.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property naming the algorithm that produced the key.
pub const PROPERTY_TYPE: &str = "type";

/// Property naming the keystore alias used for signature tokens.
pub const PROPERTY_ALIAS: &str = "alias";

/// Property granting elevated access when present on a verified token.
pub const PROPERTY_ROLE: &str = "role";

/// Signed, expiring access credential.
///
/// Wire format:
///
/// ```text
/// { "properties": { "type": "...", "alias": "..." }, "domain": "...", "expiry": 1700000000, "key": "<base64>" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    /// Free-form properties; keys are unique and ordered.
    pub properties: BTreeMap<String, String>,
    /// Issuing/verifying scope.
    pub domain: String,
    /// Absolute expiry in epoch seconds.
    pub expiry: u64,
    /// Base64 HMAC/signature output; empty when unsecured.
    pub key: String,
}

impl Token {
    /// Create an unsigned token for `domain` expiring at `expiry`.
    pub fn new(domain: impl Into<String>, expiry: u64) -> Self {
        Self {
            properties: BTreeMap::new(),
            domain: domain.into(),
            expiry,
            key: String::new(),
        }
    }

    /// Builder-style property insertion.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a property.
    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Get a property value.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The algorithm identifier recorded at signing time.
    pub fn algorithm(&self) -> Option<&str> {
        self.property(PROPERTY_TYPE)
    }

    /// The keystore alias recorded for signature tokens.
    pub fn alias(&self) -> Option<&str> {
        self.property(PROPERTY_ALIAS)
    }

    /// True when the token carries a key.
    pub fn is_secured(&self) -> bool {
        !self.key.is_empty()
    }

    /// True when `now` has reached the expiry.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expiry
    }

    /// Fixed-order byte serialization fed to HMAC and signature primitives.
    ///
    /// Order: properties (compact JSON, sorted keys), domain, expiry as a
    /// decimal string. Changing this order invalidates every issued token.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(128);
        // BTreeMap serializes with sorted keys; string maps cannot fail.
        if let Ok(properties) = serde_json::to_vec(&self.properties) {
            bytes.extend_from_slice(&properties);
        }
        bytes.extend_from_slice(self.domain.as_bytes());
        bytes.extend_from_slice(self.expiry.to_string().as_bytes());
        bytes
    }
}
