//! Small helpers for input normalization and database error classification.

use regex::Regex;

/// Language applied to accounts created without an explicit preference.
pub(super) const DEFAULT_LANGUAGE: &str = "fr";

/// Normalize an email for lookup/uniqueness checks.
/// Every lookup and every write goes through this first.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Verification codes are exactly six decimal digits.
pub(super) fn valid_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
