//! Opaque token codec: random clear values paired with SHA-256 digests.
//!
//! Clear values are handed to the client exactly once; every store and lookup
//! works on the digest, so a leaked database never yields usable tokens.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Entropy drawn for every opaque token, before encoding.
pub(super) const TOKEN_BYTES: usize = 32;

/// Create a new opaque token.
/// The raw value is only returned to the client; persistence keeps a hash.
pub(crate) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate opaque token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash an opaque token so raw values never touch a store.
/// Deterministic, used for every lookup of a presented token.
pub(crate) fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Create a zero-padded numeric verification code of `length` digits.
pub(super) fn generate_numeric_code(length: u8) -> Result<String> {
    let mut bytes = [0u8; 8];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate verification code")?;
    let value = u64::from_be_bytes(bytes);
    let modulus = 10u64.pow(u32::from(length));
    Ok(format!(
        "{:0width$}",
        value % modulus,
        width = usize::from(length)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn generate_token_encodes_full_entropy() {
        let decoded_len = generate_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(TOKEN_BYTES));
    }

    #[test]
    fn generate_token_does_not_repeat() {
        let first = generate_token().ok();
        let second = generate_token().ok();
        assert!(first.is_some());
        assert_ne!(first, second);
    }

    #[test]
    fn hash_token_deterministic() {
        let first = hash_token("token");
        let second = hash_token("token");
        let different = hash_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn distinct_tokens_hash_differently() {
        let first = generate_token().map(|token| hash_token(&token)).ok();
        let second = generate_token().map(|token| hash_token(&token)).ok();
        assert!(first.is_some());
        assert_ne!(first, second);
    }

    #[test]
    fn numeric_code_is_fixed_length_digits() {
        for length in [5u8, 6] {
            let code = generate_numeric_code(length).unwrap();
            assert_eq!(code.len(), usize::from(length));
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
