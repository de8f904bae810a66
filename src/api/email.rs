//! Outbound email dispatch.
//!
//! Flows hand a message to [`Mailer::dispatch`], which spawns a detached
//! blocking task and returns immediately: the flow's response never waits on
//! delivery, delivery failures are logged and dropped, and nothing is retried.
//!
//! The [`EmailSender`] trait decides how a message leaves the process. The
//! default for local dev is [`LogEmailSender`], which logs and returns
//! `Ok(())`; deployments with SMTP configuration get [`SmtpEmailSender`].

use anyhow::{Context, Result};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, Message, SmtpTransport,
    Transport,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{error, info};

use crate::cli::actions::server::SmtpOptions;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the dispatcher.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error; the dispatcher only logs errors.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "email send stub"
        );
        Ok(())
    }
}

/// SMTP relay sender. Port 465 uses implicit TLS, anything else STARTTLS.
pub struct SmtpEmailSender {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Build the transport once at startup from validated configuration.
    ///
    /// # Errors
    /// Returns an error if the sender address or relay host is invalid.
    pub fn new(options: &SmtpOptions, from: String) -> Result<Self> {
        let from = from
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid sender address: {from}"))?;

        let builder = if options.port == 465 {
            SmtpTransport::relay(&options.host)
        } else {
            SmtpTransport::starttls_relay(&options.host)
        }
        .with_context(|| format!("Invalid SMTP relay host: {}", options.host))?;

        let transport = builder
            .port(options.port)
            .credentials(Credentials::new(
                options.username.clone(),
                options.password.expose_secret().to_string(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

impl EmailSender for SmtpEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        let to = message
            .to_email
            .parse::<Mailbox>()
            .context("invalid recipient address")?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .body(message.body.clone())
            .context("failed to build email")?;
        self.transport
            .send(&email)
            .context("failed to send email")?;
        Ok(())
    }
}

/// Dispatch-and-detach front end over an [`EmailSender`].
#[derive(Clone)]
pub struct Mailer {
    sender: Arc<dyn EmailSender>,
}

impl Mailer {
    #[must_use]
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }

    /// Hand the message to a detached blocking task and return immediately.
    /// The flow that dispatched it completes before the outcome is known.
    pub fn dispatch(&self, message: EmailMessage) -> tokio::task::JoinHandle<()> {
        let sender = Arc::clone(&self.sender);
        tokio::task::spawn_blocking(move || {
            if let Err(err) = sender.send(&message) {
                error!(
                    to_email = %message.to_email,
                    subject = %message.subject,
                    "failed to deliver email: {err:#}"
                );
            }
        })
    }
}

pub(crate) fn welcome_email(
    to_email: &str,
    firstname: Option<&str>,
    frontend_base_url: &str,
) -> EmailMessage {
    let base = frontend_base_url.trim_end_matches('/');
    let verify_link = format!("{base}/verify-email");
    let greeting = firstname.map_or_else(|| "Hello".to_string(), |name| format!("Hello {name}"));
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Welcome to Fieldpass — confirm your address".to_string(),
        body: format!(
            "{greeting},\n\n\
             Thanks for signing up. To verify your email address, please visit: {verify_link}\n\n\
             If you did not create an account, you can ignore this message.\n\n\
             The Fieldpass team"
        ),
    }
}

pub(crate) fn password_reset_email(to_email: &str, code: &str) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Your Fieldpass password reset code".to_string(),
        body: format!("Your password reset code is: {code}. It expires in 10 minutes."),
    }
}

pub(crate) fn verification_code_email(to_email: &str, code: &str) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Your Fieldpass verification code".to_string(),
        body: format!("Your verification code is: {code}. It expires in 10 minutes."),
    }
}
