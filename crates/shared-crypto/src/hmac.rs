//! # HMAC
//!
//! Keyed MACs for shared-secret tokens. Verification goes through
//! `Mac::verify_slice`, which compares in constant time.

use crate::{Algorithm, CryptoError};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

fn compute<M: Mac + KeyInit>(secret: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut mac =
        <M as KeyInit>::new_from_slice(secret).map_err(|_| CryptoError::InvalidPrivateKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn check<M: Mac + KeyInit>(secret: &[u8], data: &[u8], expected: &[u8]) -> bool {
    let Ok(mut mac) = <M as KeyInit>::new_from_slice(secret) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(expected).is_ok()
}

/// Compute the MAC of `data` under `secret`.
///
/// # Errors
///
/// `CryptoError::AlgorithmMismatch` when `algorithm` is not an HMAC.
pub fn sign(algorithm: Algorithm, secret: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match algorithm {
        Algorithm::HmacSha256 => compute::<Hmac<Sha256>>(secret, data),
        Algorithm::HmacSha384 => compute::<Hmac<Sha384>>(secret, data),
        Algorithm::HmacSha512 => compute::<Hmac<Sha512>>(secret, data),
        other => Err(CryptoError::AlgorithmMismatch {
            algorithm: other.id().to_string(),
            operation: "hmac",
        }),
    }
}

/// Constant-time check of `expected` against the MAC of `data`.
pub fn verify(algorithm: Algorithm, secret: &[u8], data: &[u8], expected: &[u8]) -> bool {
    match algorithm {
        Algorithm::HmacSha256 => check::<Hmac<Sha256>>(secret, data, expected),
        Algorithm::HmacSha384 => check::<Hmac<Sha384>>(secret, data, expected),
        Algorithm::HmacSha512 => check::<Hmac<Sha512>>(secret, data, expected),
        _ => false,
    }
}
