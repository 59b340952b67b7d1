//! Random shared secrets.

use crate::CryptoError;
use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

/// Generates and decodes base64 shared secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretFactory;

impl SecretFactory {
    /// `bytes` random bytes from the OS RNG, base64 encoded.
    pub fn generate(bytes: usize) -> String {
        let mut buffer = Zeroizing::new(vec![0u8; bytes]);
        OsRng.fill_bytes(&mut buffer);
        general_purpose::STANDARD.encode(buffer.as_slice())
    }

    /// Decode a base64 secret.
    pub fn decode(secret: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        general_purpose::STANDARD
            .decode(secret.trim())
            .map(Zeroizing::new)
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))
    }
}
