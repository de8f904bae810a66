//! One-time verification codes.

use rand::{rngs::OsRng, Rng};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Codes expire ten minutes after issuance.
pub(super) const CODE_TTL_SECONDS: i64 = 10 * 60;

const CODE_LENGTH: usize = 6;

/// What a code is good for. A code issued for one purpose never matches a
/// consume attempt for the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum CodePurpose {
    PasswordReset,
    EmailVerify,
}

impl CodePurpose {
    pub(super) const fn as_db(self) -> &'static str {
        match self {
            Self::PasswordReset => "password_reset",
            Self::EmailVerify => "email_verify",
        }
    }
}

/// Generate a fixed-length numeric code drawn from a uniform distribution.
pub(super) fn generate_code() -> String {
    let mut rng = OsRng;
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Digest of (code ‖ server secret). Only the digest is persisted, so a
/// database leak alone is not enough to forge a code.
pub(super) fn hash_code(code: &str, secret: &SecretString) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.update(b".");
    hasher.update(secret.expose_secret().as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_decimal_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn code_digest_depends_on_code_and_secret() {
        let secret = SecretString::from("otp-secret");
        let other_secret = SecretString::from("other-secret");

        let digest = hash_code("123456", &secret);
        assert_eq!(digest, hash_code("123456", &secret));
        assert_ne!(digest, hash_code("654321", &secret));
        assert_ne!(digest, hash_code("123456", &other_secret));
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn purpose_tags_are_stable() {
        assert_eq!(CodePurpose::PasswordReset.as_db(), "password_reset");
        assert_eq!(CodePurpose::EmailVerify.as_db(), "email_verify");
    }
}
