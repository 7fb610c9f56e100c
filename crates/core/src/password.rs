//! Password hashing and strength policy.
//!
//! Two small contracts sit at this seam so services can be tested with any
//! implementation:
//! - [`PasswordHasher`] hashes a password and checks a password against a hash
//! - [`PasswordChecker`] decides whether a password is strong enough
//!
//! The production implementations are [`Argon2Hasher`] (Argon2id, PHC string
//! format) and [`PasswordPolicy`] (minimum length plus an entropy estimate).

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use std::collections::HashSet;

/// Hashes passwords and verifies them against stored hashes.
pub trait PasswordHasher: Send + Sync {
    /// Hash a password into a self-describing string.
    fn hash(&self, password: &str) -> crate::Result<String>;

    /// Check a password against a stored hash.
    ///
    /// Returns [`crate::Error::PasswordMismatch`] when the password is wrong.
    fn check(&self, password: &str, hash: &str) -> crate::Result<()>;
}

/// Decides whether a password satisfies the strength policy.
pub trait PasswordChecker: Send + Sync {
    /// Returns [`crate::Error::WeakPassword`] with a reason when rejected.
    fn is_ok(&self, password: &str) -> crate::Result<()>;
}

/// Argon2id password hasher with the crate's default parameters.
#[derive(Clone, Debug, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> crate::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| crate::Error::PasswordHash(e.to_string()))
    }

    fn check(&self, password: &str, hash: &str) -> crate::Result<()> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| crate::Error::PasswordHash(format!("stored hash is malformed: {e}")))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| crate::Error::PasswordMismatch)
    }
}

/// Minimum length plus entropy strength policy.
#[derive(Clone, Debug)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub min_entropy: f64,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            min_entropy: 28.0,
        }
    }
}

impl PasswordPolicy {
    /// Build a policy from configuration.
    pub fn from_config(config: &crate::config::PasswordConfig) -> Self {
        Self {
            min_length: config.min_length,
            min_entropy: config.min_entropy,
        }
    }

    /// Estimate password entropy in bits.
    ///
    /// The character pool is the union of the classes present (lowercase,
    /// uppercase, digits, ASCII symbols, anything else). Repeated characters
    /// count for half a position each.
    pub fn entropy(password: &str) -> f64 {
        let mut pool = 0u32;
        let chars: Vec<char> = password.chars().collect();
        if chars.iter().any(|c| c.is_ascii_lowercase()) {
            pool += 26;
        }
        if chars.iter().any(|c| c.is_ascii_uppercase()) {
            pool += 26;
        }
        if chars.iter().any(|c| c.is_ascii_digit()) {
            pool += 10;
        }
        if chars.iter().any(|c| c.is_ascii_punctuation() || *c == ' ') {
            pool += 33;
        }
        if chars.iter().any(|c| !c.is_ascii()) {
            pool += 100;
        }
        if pool == 0 {
            return 0.0;
        }

        let distinct = chars.iter().collect::<HashSet<_>>().len();
        let repeated = chars.len() - distinct;
        let positions = distinct as f64 + repeated as f64 * 0.5;
        positions * f64::from(pool).log2()
    }
}

impl PasswordChecker for PasswordPolicy {
    fn is_ok(&self, password: &str) -> crate::Result<()> {
        let len = password.chars().count();
        if len < self.min_length {
            return Err(crate::Error::WeakPassword(format!(
                "must be at least {} characters",
                self.min_length
            )));
        }
        let entropy = Self::entropy(password);
        if entropy < self.min_entropy {
            return Err(crate::Error::WeakPassword(format!(
                "too predictable ({entropy:.1} bits, need {:.1})",
                self.min_entropy
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_check() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        hasher.check("correct horse", &hash).unwrap();
        assert!(matches!(
            hasher.check("wrong horse", &hash),
            Err(crate::Error::PasswordMismatch)
        ));
    }

    #[test]
    fn test_check_malformed_hash() {
        assert!(matches!(
            Argon2Hasher.check("anything", "not-a-phc-string"),
            Err(crate::Error::PasswordHash(_))
        ));
    }

    #[test]
    fn test_entropy_ordering() {
        let weak = PasswordPolicy::entropy("aaaaaaaa");
        let plain = PasswordPolicy::entropy("password");
        let mixed = PasswordPolicy::entropy("Pa55w0rd!x");
        assert!(weak < plain);
        assert!(plain < mixed);
        assert_eq!(PasswordPolicy::entropy(""), 0.0);
    }

    #[test]
    fn test_policy() {
        let policy = PasswordPolicy::default();
        assert!(policy.is_ok("short").is_err());
        assert!(policy.is_ok("aaaaaaaa").is_err());
        policy.is_ok("tr0ub4dor&3").unwrap();
    }
}
