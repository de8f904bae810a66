//! Refresh credential rotation.

use anyhow::Context;
use axum::{extract::Extension, Json};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::state::AuthState;
use super::storage;
use super::tokens;
use super::types::{RefreshRequest, TokenPair};

/// Exchange a refresh secret for a new token pair.
///
/// Rotation is one-time use: revoking the presented credential and issuing
/// its replacement commit together, so a replayed secret can never win twice
/// and a failed issuance leaves the old credential usable.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated", body = TokenPair),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Credential revoked, expired, or unknown")
    ),
    tag = "auth"
)]
pub async fn refresh(
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Json<TokenPair>, AuthError> {
    let Json(request) = payload.ok_or_else(|| AuthError::validation("missing request body"))?;
    request.validate()?;

    let token_hash = tokens::hash_refresh_secret(request.refresh_token.trim());

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin refresh transaction")?;

    let account_id = storage::consume_refresh_token(&mut tx, &token_hash)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    let pair = tokens::issue_token_pair(&mut tx, state.config(), account_id).await?;
    tx.commit()
        .await
        .context("failed to commit refresh transaction")?;

    Ok(Json(pair))
}
