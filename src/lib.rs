//! # Fieldpass (Credential & Session Authority)
//!
//! `fieldpass` is the account credential and session lifecycle service for a
//! multi-tenant field-management platform. It authenticates users by password
//! or a federated Google identity, issues and rotates session credentials, and
//! mediates short-lived one-time codes for password reset and email
//! verification.
//!
//! ## Credentials
//!
//! - **Access tokens** are compact signed tokens (HS256) carrying the account
//!   id and an expiration claim. They are self-contained and verified offline.
//! - **Refresh credentials** are opaque high-entropy secrets. Only their
//!   SHA-256 digest is stored; presenting one for renewal revokes it and
//!   issues a replacement (one-time use rotation).
//! - **Verification codes** are 6-digit one-time codes bound to an email and
//!   a purpose, stored as a keyed digest, valid for 10 minutes, single-use.
//!
//! ## Enumeration resistance
//!
//! `POST /v1/auth/forgot-password` reports success whether or not the email
//! is registered, so the endpoint cannot be used to probe for accounts.
//!
//! ## Email
//!
//! Outbound email is dispatch-and-detach: flows enqueue a message and return
//! without waiting for delivery. Failures are logged and dropped, never
//! retried and never surfaced to the caller.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
