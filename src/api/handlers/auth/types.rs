//! Request/response types for auth endpoints.
//!
//! Each request type carries its own `validate()`; handlers call it before
//! any flow logic so shape checks never mix with datastore work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::AuthError;
use super::storage::AccountRecord;
use super::utils::{valid_code, valid_email};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub organisation: Option<String>,
    pub email: String,
    pub password: String,
    pub language: Option<String>,
}

impl RegisterRequest {
    pub(super) fn validate(&self) -> Result<(), AuthError> {
        validate_email_field(&self.email)?;
        validate_new_password(&self.password)?;
        validate_optional_name("firstname", self.firstname.as_deref())?;
        validate_optional_name("lastname", self.lastname.as_deref())?;
        Ok(())
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub(super) fn validate(&self) -> Result<(), AuthError> {
        validate_email_field(&self.email)?;
        if self.password.is_empty() {
            return Err(AuthError::validation("password: must not be empty"));
        }
        Ok(())
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FederatedLoginRequest {
    pub assertion_token: String,
}

impl FederatedLoginRequest {
    pub(super) fn validate(&self) -> Result<(), AuthError> {
        if self.assertion_token.trim().is_empty() {
            return Err(AuthError::validation("assertionToken: must not be empty"));
        }
        Ok(())
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl RefreshRequest {
    pub(super) fn validate(&self) -> Result<(), AuthError> {
        if self.refresh_token.trim().is_empty() {
            return Err(AuthError::validation("refreshToken: must not be empty"));
        }
        Ok(())
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub(super) fn validate(&self) -> Result<(), AuthError> {
        validate_email_field(&self.email)
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

impl ResetPasswordRequest {
    pub(super) fn validate(&self) -> Result<(), AuthError> {
        validate_email_field(&self.email)?;
        validate_code_field(&self.code)?;
        validate_new_password(&self.new_password)
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmailVerificationRequest {
    pub email: String,
}

impl EmailVerificationRequest {
    pub(super) fn validate(&self) -> Result<(), AuthError> {
        validate_email_field(&self.email)
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ConfirmEmailRequest {
    pub email: String,
    pub code: String,
}

impl ConfirmEmailRequest {
    pub(super) fn validate(&self) -> Result<(), AuthError> {
        validate_email_field(&self.email)?;
        validate_code_field(&self.code)
    }
}

/// Access token plus the one-time-visible refresh secret.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// The account payload returned by authentication flows. Never carries the
/// password hash.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub name: Option<String>,
    pub organisation: Option<String>,
    pub language: String,
    pub picture: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
}

impl From<AccountRecord> for AccountResponse {
    fn from(account: AccountRecord) -> Self {
        Self {
            id: account.id,
            email: account.email,
            firstname: account.firstname,
            lastname: account.lastname,
            name: account.name,
            organisation: account.organisation,
            language: account.language,
            picture: account.picture,
            email_verified_at: account.email_verified_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub account: AccountResponse,
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthResponse {
    pub(super) fn new(account: AccountRecord, pair: TokenPair) -> Self {
        Self {
            account: AccountResponse::from(account),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OkResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_verified: Option<bool>,
}

impl OkResponse {
    pub(super) const fn ok() -> Self {
        Self {
            ok: true,
            already_verified: None,
        }
    }

    pub(super) const fn already_verified() -> Self {
        Self {
            ok: true,
            already_verified: Some(true),
        }
    }
}

fn validate_email_field(email: &str) -> Result<(), AuthError> {
    if valid_email(&email.trim().to_lowercase()) {
        Ok(())
    } else {
        Err(AuthError::validation("email: invalid format"))
    }
}

fn validate_code_field(code: &str) -> Result<(), AuthError> {
    if valid_code(code.trim()) {
        Ok(())
    } else {
        Err(AuthError::validation("code: must be 6 digits"))
    }
}

fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        Err(AuthError::validation(
            "password: must be at least 8 characters",
        ))
    } else {
        Ok(())
    }
}

fn validate_optional_name(field: &str, value: Option<&str>) -> Result<(), AuthError> {
    match value {
        Some(value) if value.trim().is_empty() => Err(AuthError::validation(format!(
            "{field}: must not be empty"
        ))),
        _ => Ok(()),
    }
}
