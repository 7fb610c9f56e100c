//! Random token generation and comparison.
//!
//! Session and CSRF tokens are opaque lowercase hex strings built from
//! operating-system randomness.

use rand::RngCore;
use rand::rngs::OsRng;

/// Default number of random bytes behind a token (64 hex characters).
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Upper bound on a single token request.
pub const MAX_TOKEN_BYTES: usize = 1024;

/// Generate a random token of `len` bytes, hex encoded.
///
/// Returns [`crate::Error::InvalidArgument`] for a zero length or one above
/// [`MAX_TOKEN_BYTES`].
pub fn random_hex(len: usize) -> crate::Result<String> {
    if len == 0 || len > MAX_TOKEN_BYTES {
        return Err(crate::Error::InvalidArgument(format!(
            "token length must be between 1 and {MAX_TOKEN_BYTES} bytes, got {len}"
        )));
    }

    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    Ok(hex::encode(buf))
}

/// Compare two tokens without short-circuiting on the first differing byte.
pub fn tokens_match(expected: &str, supplied: &str) -> bool {
    let (a, b) = (expected.as_bytes(), supplied.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_hex_length_and_alphabet() {
        let token = random_hex(16).unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_random_hex_is_not_repeated() {
        let a = random_hex(DEFAULT_TOKEN_BYTES).unwrap();
        let b = random_hex(DEFAULT_TOKEN_BYTES).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_hex_rejects_bad_lengths() {
        assert!(matches!(
            random_hex(0),
            Err(crate::Error::InvalidArgument(_))
        ));
        assert!(matches!(
            random_hex(MAX_TOKEN_BYTES + 1),
            Err(crate::Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc123", "abc123"));
        assert!(!tokens_match("abc123", "abc124"));
        assert!(!tokens_match("abc123", "abc12"));
        assert!(!tokens_match("", "a"));
    }
}
