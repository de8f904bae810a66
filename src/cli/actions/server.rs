use crate::api::{
    self,
    email::{EmailSender, LogEmailSender, Mailer, SmtpEmailSender},
    handlers::auth::{AuthConfig, AuthState, GoogleTokenVerifier, IdentityVerifier},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub access_token_secret: SecretString,
    pub otp_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub google_client_id: Option<String>,
    pub smtp: Option<SmtpOptions>,
    pub smtp_from: String,
}

pub struct SmtpOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &self.dsn)
            .field("access_token_secret", &"***")
            .field("otp_secret", &"***")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field("frontend_base_url", &self.frontend_base_url)
            .field("google_client_id", &self.google_client_id)
            .field("smtp", &self.smtp)
            .field("smtp_from", &self.smtp_from)
            .finish()
    }
}

impl std::fmt::Debug for SmtpOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Execute the server action.
///
/// Collaborators (identity verifier, mail sender) are constructed here, once,
/// from validated configuration and injected into the shared state; handlers
/// never build them lazily.
///
/// # Errors
/// Returns an error if the SMTP transport cannot be built or the server fails
/// to start.
pub async fn execute(action: crate::cli::actions::Action) -> Result<()> {
    let crate::cli::actions::Action::Server(args) = action;

    let config = AuthConfig::new(
        args.frontend_base_url,
        args.access_token_secret,
        args.otp_secret,
    )
    .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
    .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds);

    let verifier: Option<Arc<dyn IdentityVerifier>> = match args.google_client_id {
        Some(client_id) => Some(Arc::new(GoogleTokenVerifier::new(client_id)?)),
        None => {
            info!("Google client id not configured; federated login disabled");
            None
        }
    };

    let sender: Arc<dyn EmailSender> = match args.smtp {
        Some(smtp) => Arc::new(
            SmtpEmailSender::new(&smtp, args.smtp_from)
                .context("Failed to build SMTP transport")?,
        ),
        None => {
            info!("SMTP not configured; outbound email will be logged");
            Arc::new(LogEmailSender)
        }
    };

    let state = Arc::new(AuthState::new(config, verifier, Mailer::new(sender)));

    api::new(args.port, args.dsn, state).await
}
