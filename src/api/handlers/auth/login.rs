//! Password and federated login.

use anyhow::Context;
use axum::{extract::Extension, Json};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::identity::merge_profile;
use super::password;
use super::state::AuthState;
use super::storage::{self, InsertAccountOutcome, NewAccount};
use super::tokens;
use super::types::{AuthResponse, FederatedLoginRequest, LoginRequest};
use super::utils::{normalize_email, DEFAULT_LANGUAGE};

/// Authenticate with email and password.
///
/// Unknown email, absent password credential, and wrong password are all the
/// same `Unauthorized` to the caller.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<AuthResponse>, AuthError> {
    let Json(request) = payload.ok_or_else(|| AuthError::validation("missing request body"))?;
    request.validate()?;

    let email = normalize_email(&request.email);
    let account = storage::lookup_account_by_email(&pool, &email)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    // A federated-only account has no hash and can never pass this check.
    if !password::verify(&request.password, account.password_hash.as_deref()) {
        return Err(AuthError::Unauthorized);
    }

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin login transaction")?;
    let pair = tokens::issue_token_pair(&mut tx, state.config(), account.id).await?;
    tx.commit()
        .await
        .context("failed to commit login transaction")?;

    Ok(Json(AuthResponse::new(account, pair)))
}

/// Authenticate with a federated identity assertion, creating or merging the
/// local account.
#[utoipa::path(
    post,
    path = "/v1/auth/login/google",
    request_body = FederatedLoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Assertion rejected"),
        (status = 500, description = "Provider not configured")
    ),
    tag = "auth"
)]
pub async fn login_google(
    state: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    payload: Option<Json<FederatedLoginRequest>>,
) -> Result<Json<AuthResponse>, AuthError> {
    let Json(request) = payload.ok_or_else(|| AuthError::validation("missing request body"))?;
    request.validate()?;

    let verifier = state
        .verifier()
        .ok_or(AuthError::Unconfigured("federated login is not configured"))?;
    let assertion = verifier.verify(request.assertion_token.trim()).await?;
    let email = normalize_email(&assertion.email);

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin federated login transaction")?;

    let account = match storage::lookup_account_by_email_for_update(&mut tx, &email).await? {
        None => {
            match storage::insert_account(
                &mut tx,
                &NewAccount {
                    email: &email,
                    password_hash: None,
                    firstname: assertion.given_name.as_deref(),
                    lastname: assertion.family_name.as_deref(),
                    name: assertion.display_name.as_deref(),
                    organisation: None,
                    language: DEFAULT_LANGUAGE,
                    picture: assertion.picture.as_deref(),
                    email_verified: assertion.email_verified,
                },
            )
            .await?
            {
                InsertAccountOutcome::Created(account) => account,
                // Lost a race against a concurrent signup for the same email.
                InsertAccountOutcome::Conflict => return Err(AuthError::Conflict),
            }
        }
        Some(account) => {
            let patch = merge_profile(&account, &assertion);
            storage::update_account_profile(&mut tx, account.id, &patch).await?
        }
    };

    let pair = tokens::issue_token_pair(&mut tx, state.config(), account.id).await?;
    tx.commit()
        .await
        .context("failed to commit federated login transaction")?;

    Ok(Json(AuthResponse::new(account, pair)))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{auth_state, lazy_pool};
    use super::{login, login_google, FederatedLoginRequest, LoginRequest};
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let response = login(Extension(auth_state()), Extension(lazy_pool()?), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_empty_password() -> Result<()> {
        let response = login(
            Extension(auth_state()),
            Extension(lazy_pool()?),
            Some(Json(LoginRequest {
                email: "alice@example.com".to_string(),
                password: String::new(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn federated_login_without_provider_is_unconfigured() -> Result<()> {
        // auth_state() carries no verifier, mirroring a deployment without
        // provider credentials.
        let response = login_google(
            Extension(auth_state()),
            Extension(lazy_pool()?),
            Some(Json(FederatedLoginRequest {
                assertion_token: "assertion".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }

    #[tokio::test]
    async fn federated_login_rejects_blank_assertion() -> Result<()> {
        let response = login_google(
            Extension(auth_state()),
            Extension(lazy_pool()?),
            Some(Json(FederatedLoginRequest {
                assertion_token: "  ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
