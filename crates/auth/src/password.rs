//! Password hashing capability.
//!
//! The account service only needs `hash` and `verify`; the primitive behind
//! them is swappable. The default is Argon2id with a random salt per hash.

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
    },
};

use warden_core::{AuthError, AuthResult};

/// Hash/verify capability consumed by the account service.
pub trait PasswordHasher: Send + Sync {
    /// Produce a self-describing digest of `plain`.
    fn hash(&self, plain: &str) -> AuthResult<String>;

    /// `true` iff `plain` matches `digest`. Malformed digests never match.
    fn verify(&self, plain: &str, digest: &str) -> bool;
}

/// Argon2id with default parameters, PHC-formatted digests.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    fn verify(&self, plain: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hasher = Argon2Hasher::new();
        let digest = hasher.hash("TestPassword123!").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify("TestPassword123!", &digest));
        assert!(!hasher.verify("WrongPassword123!", &digest));
    }

    #[test]
    fn same_password_different_digests() {
        let hasher = Argon2Hasher::new();
        let a = hasher.hash("Password1").unwrap();
        let b = hasher.hash("Password1").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("Password1", &a));
        assert!(hasher.verify("Password1", &b));
    }

    #[test]
    fn malformed_digest_never_matches() {
        let hasher = Argon2Hasher::new();
        assert!(!hasher.verify("password", "not-a-valid-hash"));
        assert!(!hasher.verify("", ""));
    }
}
