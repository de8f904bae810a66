//! Bearer-token session introspection.

use axum::{extract::Extension, http::header::AUTHORIZATION, http::HeaderMap, Json};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{self, AccountRecord};
use super::tokens;
use super::types::AccountResponse;

/// Resolve the bearer access token to its account payload.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Token is valid", body = AccountResponse),
        (status = 401, description = "Missing, expired, or forged token")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<Json<AccountResponse>, AuthError> {
    let account = authenticate_bearer(&headers, &state, &pool).await?;
    Ok(Json(AccountResponse::from(account)))
}

/// Resolve the Authorization header to an account.
///
/// Shared by handlers that require an authenticated caller. A valid token for
/// an account that no longer exists is treated the same as a bad token.
pub(super) async fn authenticate_bearer(
    headers: &HeaderMap,
    state: &AuthState,
    pool: &PgPool,
) -> Result<AccountRecord, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::Unauthorized)?;
    let account_id = tokens::verify_access_token(state.config(), &token)?;
    storage::lookup_account_by_id(pool, account_id)
        .await?
        .ok_or(AuthError::Unauthorized)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
