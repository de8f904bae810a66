//! Auth state and process-wide configuration.
//!
//! Everything here is built once at startup and read-only afterwards;
//! requests share it through an `Extension<Arc<AuthState>>`.

use secrecy::SecretString;
use std::sync::Arc;

use super::identity::IdentityVerifier;
use crate::api::email::Mailer;

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone)]
pub struct AuthConfig {
    frontend_base_url: String,
    access_token_secret: SecretString,
    otp_secret: SecretString,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(
        frontend_base_url: String,
        access_token_secret: SecretString,
        otp_secret: SecretString,
    ) -> Self {
        Self {
            frontend_base_url,
            access_token_secret,
            otp_secret,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn access_token_secret(&self) -> &SecretString {
        &self.access_token_secret
    }

    pub(super) fn otp_secret(&self) -> &SecretString {
        &self.otp_secret
    }

    pub(super) fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    pub(super) fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("frontend_base_url", &self.frontend_base_url)
            .field("access_token_secret", &"***")
            .field("otp_secret", &"***")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .finish()
    }
}

pub struct AuthState {
    config: AuthConfig,
    verifier: Option<Arc<dyn IdentityVerifier>>,
    mailer: Mailer,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        verifier: Option<Arc<dyn IdentityVerifier>>,
        mailer: Mailer,
    ) -> Self {
        Self {
            config,
            verifier,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn verifier(&self) -> Option<&Arc<dyn IdentityVerifier>> {
        self.verifier.as_ref()
    }

    pub(super) fn mailer(&self) -> &Mailer {
        &self.mailer
    }
}
