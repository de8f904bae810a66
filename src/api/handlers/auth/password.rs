//! Password hashing and verification.

use anyhow::{anyhow, Result};
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Scrypt,
};

/// Derive a memory-hard one-way digest with a per-call random salt.
///
/// The returned PHC string embeds the algorithm parameters and the salt, so
/// verification needs nothing but the stored form itself.
pub(super) fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?
        .to_string();
    Ok(hash)
}

/// Recompute the digest with the embedded salt and compare in constant time.
///
/// Returns false for an absent or malformed stored form; never errors, so an
/// account without a password credential can simply never pass.
pub(super) fn verify(password: &str, stored: Option<&str>) -> bool {
    let Some(stored) = stored else {
        return false;
    };
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Scrypt
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::{hash, verify};

    #[test]
    fn hash_then_verify_round_trips() {
        let stored = hash("password123").unwrap();
        assert!(verify("password123", Some(&stored)));
        assert!(!verify("wrongpass", Some(&stored)));
    }

    #[test]
    fn hashes_are_salted_per_call() {
        let first = hash("password123").unwrap();
        let second = hash("password123").unwrap();
        assert_ne!(first, second);
        assert!(verify("password123", Some(&first)));
        assert!(verify("password123", Some(&second)));
    }

    #[test]
    fn verify_rejects_absent_or_malformed_stored_forms() {
        assert!(!verify("password123", None));
        assert!(!verify("password123", Some("")));
        assert!(!verify("password123", Some("not-a-phc-string")));
        assert!(!verify("password123", Some("$unknown$v=1$abc")));
    }
}
