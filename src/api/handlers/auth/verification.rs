//! Email verification: code request and confirmation.

use anyhow::Context;
use axum::{extract::Extension, Json};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::email;

use super::error::AuthError;
use super::otp::{self, CodePurpose};
use super::state::AuthState;
use super::storage;
use super::types::{ConfirmEmailRequest, EmailVerificationRequest, OkResponse};
use super::utils::normalize_email;

/// Issue an email verification code, unless the account is already verified.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email/request",
    request_body = EmailVerificationRequest,
    responses(
        (status = 200, description = "Code issued (or already verified)", body = OkResponse),
        (status = 400, description = "Malformed request"),
        (status = 404, description = "No account for this email")
    ),
    tag = "auth"
)]
pub async fn request_verification(
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<EmailVerificationRequest>>,
) -> Result<Json<OkResponse>, AuthError> {
    let Json(request) = payload.ok_or_else(|| AuthError::validation("missing request body"))?;
    request.validate()?;

    let email = normalize_email(&request.email);
    let account = storage::lookup_account_by_email(&pool, &email)
        .await?
        .ok_or(AuthError::NotFound("account not found"))?;

    if account.email_verified_at.is_some() {
        return Ok(Json(OkResponse::already_verified()));
    }

    let code = otp::generate_code();
    let code_hash = otp::hash_code(&code, state.config().otp_secret());
    storage::insert_verification_code(
        &pool,
        Some(account.id),
        &email,
        CodePurpose::EmailVerify,
        &code_hash,
        otp::CODE_TTL_SECONDS,
    )
    .await?;

    state
        .mailer()
        .dispatch(email::verification_code_email(&email, &code));

    Ok(Json(OkResponse::ok()))
}

/// Consume a verification code and set the verified timestamp.
///
/// Confirming an already-verified account still consumes the code, so a
/// delivered code can never be replayed regardless of account state.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email/confirm",
    request_body = ConfirmEmailRequest,
    responses(
        (status = 200, description = "Email verified (or already verified)", body = OkResponse),
        (status = 400, description = "Invalid or expired code"),
        (status = 404, description = "No account for this email")
    ),
    tag = "auth"
)]
pub async fn confirm_verification(
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<ConfirmEmailRequest>>,
) -> Result<Json<OkResponse>, AuthError> {
    let Json(request) = payload.ok_or_else(|| AuthError::validation("missing request body"))?;
    request.validate()?;

    let email = normalize_email(&request.email);
    let code_hash = otp::hash_code(request.code.trim(), state.config().otp_secret());

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin verify-email transaction")?;

    storage::consume_verification_code(&mut tx, &email, CodePurpose::EmailVerify, &code_hash)
        .await?
        .ok_or(AuthError::InvalidOrExpired)?;

    let account = storage::lookup_account_by_email_for_update(&mut tx, &email)
        .await?
        .ok_or(AuthError::NotFound("account not found"))?;

    if account.email_verified_at.is_some() {
        // Commit so the consumption sticks even though nothing else changes.
        tx.commit()
            .await
            .context("failed to commit verify-email transaction")?;
        return Ok(Json(OkResponse::already_verified()));
    }

    storage::set_email_verified(&mut tx, account.id).await?;
    tx.commit()
        .await
        .context("failed to commit verify-email transaction")?;

    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{auth_state, lazy_pool};
    use super::{
        confirm_verification, request_verification, ConfirmEmailRequest, EmailVerificationRequest,
    };
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;

    #[tokio::test]
    async fn request_verification_missing_payload() -> Result<()> {
        let response =
            request_verification(Extension(auth_state()), Extension(lazy_pool()?), None)
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn request_verification_rejects_invalid_email() -> Result<()> {
        let response = request_verification(
            Extension(auth_state()),
            Extension(lazy_pool()?),
            Some(Json(EmailVerificationRequest {
                email: "missing-at.example.com".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn confirm_verification_rejects_malformed_code() -> Result<()> {
        let response = confirm_verification(
            Extension(auth_state()),
            Extension(lazy_pool()?),
            Some(Json(ConfirmEmailRequest {
                email: "alice@example.com".to_string(),
                code: "abc123".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
