//! Password reset: code request and reset confirmation.

use anyhow::Context;
use axum::{extract::Extension, Json};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::email;

use super::error::AuthError;
use super::otp::{self, CodePurpose};
use super::password;
use super::state::AuthState;
use super::storage;
use super::types::{ForgotPasswordRequest, OkResponse, ResetPasswordRequest};
use super::utils::normalize_email;

/// Issue a password reset code and deliver it by email.
///
/// The outcome is identical whether or not the email is registered, so the
/// endpoint cannot be used to probe for accounts.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Accepted", body = OkResponse),
        (status = 400, description = "Malformed request")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Result<Json<OkResponse>, AuthError> {
    let Json(request) = payload.ok_or_else(|| AuthError::validation("missing request body"))?;
    request.validate()?;

    let email = normalize_email(&request.email);
    let account = storage::lookup_account_by_email(&pool, &email).await?;

    let code = otp::generate_code();
    let code_hash = otp::hash_code(&code, state.config().otp_secret());
    storage::insert_verification_code(
        &pool,
        account.map(|account| account.id),
        &email,
        CodePurpose::PasswordReset,
        &code_hash,
        otp::CODE_TTL_SECONDS,
    )
    .await?;

    state
        .mailer()
        .dispatch(email::password_reset_email(&email, &code));

    Ok(Json(OkResponse::ok()))
}

/// Consume a reset code and set the new password.
///
/// Code consumption, the password change, and the revocation of every
/// outstanding refresh credential commit as one transaction: a reset either
/// fully invalidates old sessions or does not happen at all.
#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = OkResponse),
        (status = 400, description = "Invalid or expired code"),
        (status = 404, description = "No account for this email")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Json<OkResponse>, AuthError> {
    let Json(request) = payload.ok_or_else(|| AuthError::validation("missing request body"))?;
    request.validate()?;

    let email = normalize_email(&request.email);
    let code_hash = otp::hash_code(request.code.trim(), state.config().otp_secret());
    let password_hash = password::hash(&request.new_password)?;

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin password reset transaction")?;

    storage::consume_verification_code(&mut tx, &email, CodePurpose::PasswordReset, &code_hash)
        .await?
        .ok_or(AuthError::InvalidOrExpired)?;

    // A rollback from here on leaves the code unconsumed.
    let account = storage::lookup_account_by_email_for_update(&mut tx, &email)
        .await?
        .ok_or(AuthError::NotFound("account not found"))?;

    storage::update_account_password(&mut tx, account.id, &password_hash).await?;
    storage::revoke_all_refresh_tokens(&mut tx, account.id).await?;

    tx.commit()
        .await
        .context("failed to commit password reset transaction")?;

    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{auth_state, lazy_pool};
    use super::{forgot_password, reset_password, ForgotPasswordRequest, ResetPasswordRequest};
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;

    #[tokio::test]
    async fn forgot_password_missing_payload() -> Result<()> {
        let response = forgot_password(Extension(auth_state()), Extension(lazy_pool()?), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn forgot_password_rejects_invalid_email() -> Result<()> {
        let response = forgot_password(
            Extension(auth_state()),
            Extension(lazy_pool()?),
            Some(Json(ForgotPasswordRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_rejects_malformed_code() -> Result<()> {
        let response = reset_password(
            Extension(auth_state()),
            Extension(lazy_pool()?),
            Some(Json(ResetPasswordRequest {
                email: "alice@example.com".to_string(),
                code: "12ab56".to_string(),
                new_password: "password123".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_rejects_short_replacement() -> Result<()> {
        let response = reset_password(
            Extension(auth_state()),
            Extension(lazy_pool()?),
            Some(Json(ResetPasswordRequest {
                email: "alice@example.com".to_string(),
                code: "123456".to_string(),
                new_password: "short".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
