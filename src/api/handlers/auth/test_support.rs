//! Shared fixtures for handler tests.
//!
//! The lazy pool never opens a connection; it only exists so handlers can be
//! called directly on paths that fail before any database work.

use secrecy::SecretString;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

use super::state::{AuthConfig, AuthState};
use crate::api::email::{LogEmailSender, Mailer};

pub(super) fn auth_state() -> Arc<AuthState> {
    let config = AuthConfig::new(
        "https://app.fieldpass.dev".to_string(),
        SecretString::from("signing-secret"),
        SecretString::from("otp-secret"),
    );
    Arc::new(AuthState::new(
        config,
        None,
        Mailer::new(Arc::new(LogEmailSender)),
    ))
}

pub(super) fn lazy_pool() -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")
}
