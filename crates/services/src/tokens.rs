//! Opaque secrets: generation and at-rest digests.

use domains::{AppError, Result};
use sha2::{Digest, Sha256};

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf)
        .map_err(|e| AppError::Internal(format!("entropy source unavailable: {e}")))?;
    Ok(buf)
}

/// 32 random bytes, hex encoded. Handed to the client once.
pub fn generate_token() -> Result<String> {
    Ok(hex::encode(random_bytes::<32>()?))
}

/// 16 random bytes, hex encoded.
pub fn generate_id() -> Result<String> {
    Ok(hex::encode(random_bytes::<16>()?))
}

/// SHA-256 hex digest; what gets stored for every issued token.
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_64_hex_chars_and_unique() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_eq!(generate_id().unwrap().len(), 32);
    }

    #[test]
    fn digest_is_sha256_hex() {
        assert_eq!(
            digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
