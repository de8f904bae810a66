//! Account registration (password path).

use anyhow::Context;
use axum::{extract::Extension, http::StatusCode, Json};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::email;

use super::error::AuthError;
use super::password;
use super::state::AuthState;
use super::storage::{self, InsertAccountOutcome, NewAccount};
use super::tokens;
use super::types::{AuthResponse, RegisterRequest};
use super::utils::{normalize_email, DEFAULT_LANGUAGE};

/// Create an account with a password credential and issue the first token
/// pair. The welcome email is dispatched after commit and never blocks or
/// fails the flow.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Malformed request"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let Json(request) = payload.ok_or_else(|| AuthError::validation("missing request body"))?;
    request.validate()?;

    let email = normalize_email(&request.email);
    let password_hash = password::hash(&request.password)?;
    let name = display_name(request.firstname.as_deref(), request.lastname.as_deref());

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin register transaction")?;

    let account = match storage::insert_account(
        &mut tx,
        &NewAccount {
            email: &email,
            password_hash: Some(&password_hash),
            firstname: request.firstname.as_deref(),
            lastname: request.lastname.as_deref(),
            name: name.as_deref(),
            organisation: request.organisation.as_deref(),
            language: request.language.as_deref().unwrap_or(DEFAULT_LANGUAGE),
            picture: None,
            email_verified: false,
        },
    )
    .await?
    {
        InsertAccountOutcome::Created(account) => account,
        InsertAccountOutcome::Conflict => return Err(AuthError::Conflict),
    };

    let pair = tokens::issue_token_pair(&mut tx, state.config(), account.id).await?;
    tx.commit()
        .await
        .context("failed to commit register transaction")?;

    state.mailer().dispatch(email::welcome_email(
        &account.email,
        account.firstname.as_deref(),
        state.config().frontend_base_url(),
    ));

    Ok((StatusCode::CREATED, Json(AuthResponse::new(account, pair))))
}

fn display_name(firstname: Option<&str>, lastname: Option<&str>) -> Option<String> {
    let name = format!(
        "{} {}",
        firstname.unwrap_or_default(),
        lastname.unwrap_or_default()
    );
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
