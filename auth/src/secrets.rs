//! Raw secret utilities: random token generation and deterministic
//! fingerprinting.
//!
//! Fingerprints let the store index a token without ever holding the raw
//! value; only the caller who received the raw token can re-derive the key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

/// Byte length used when a caller passes 0 to [`random_token`].
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Error type for secret generation.
#[derive(Debug, Clone, Error)]
pub enum SecretsError {
    #[error("Entropy source failure: {0}")]
    EntropyFailure(String),
}

/// Deterministic one-way digest of a raw secret, hex encoded.
///
/// Same input always produces the same output, so it can be used as a
/// storage lookup key for refresh and reset tokens.
pub fn fingerprint(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

/// Generate a cryptographically secure random token, URL-safe base64
/// encoded without padding.
///
/// A `byte_length` of 0 selects the 32-byte default; anything else is used
/// as given (token identifiers embedded in JWTs use a shorter length).
///
/// # Errors
/// * `EntropyFailure` - the OS entropy source failed
pub fn random_token(byte_length: usize) -> Result<String, SecretsError> {
    let byte_length = if byte_length == 0 {
        DEFAULT_TOKEN_BYTES
    } else {
        byte_length
    };

    let mut bytes = vec![0u8; byte_length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SecretsError::EntropyFailure(e.to_string()))?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
