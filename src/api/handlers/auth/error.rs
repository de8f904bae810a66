//! Flow error taxonomy and its single transport mapping.
//!
//! Every flow failure is one of these kinds; handlers return them through the
//! normal `Result` channel and this module maps each kind to a status and a
//! JSON body in exactly one place. Internal failures are logged here and
//! answered with a generic body so no datastore or crypto detail can leak.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input; the message carries the offending field.
    #[error("{0}")]
    Validation(String),

    #[error("email already registered")]
    Conflict,

    /// Bad credentials, bad/expired/forged token, or bad federated assertion.
    /// Deliberately undifferentiated so callers learn nothing from the kind
    /// of failure.
    #[error("invalid credentials")]
    Unauthorized,

    #[error("invalid or expired code")]
    InvalidOrExpired,

    #[error("{0}")]
    NotFound(&'static str),

    /// A collaborator this flow needs was not configured at startup. Fatal to
    /// the request, not to the process.
    #[error("{0}")]
    Unconfigured(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub(crate) fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            Self::Conflict => (StatusCode::CONFLICT, self.to_string()),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::InvalidOrExpired => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, (*message).to_string()),
            Self::Unconfigured(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, (*message).to_string())
            }
            Self::Internal(err) => {
                error!("internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "unexpected error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::AuthError;
    use anyhow::anyhow;
    use axum::{http::StatusCode, response::IntoResponse};

    #[test]
    fn statuses_match_taxonomy() {
        let cases = [
            (
                AuthError::validation("email: invalid format"),
                StatusCode::BAD_REQUEST,
            ),
            (AuthError::Conflict, StatusCode::CONFLICT),
            (AuthError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidOrExpired, StatusCode::BAD_REQUEST),
            (AuthError::NotFound("account not found"), StatusCode::NOT_FOUND),
            (
                AuthError::Unconfigured("federated login is not configured"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AuthError::Internal(anyhow!("connection refused")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn internal_detail_never_reaches_the_body() {
        let response =
            AuthError::Internal(anyhow!("password digest mismatch for row 42")).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!body.contains("digest"));
        assert!(!body.contains("42"));
        assert!(body.contains("unexpected error"));
    }

    #[tokio::test]
    async fn validation_detail_is_surfaced() {
        let response = AuthError::validation("password: must be at least 8 characters")
            .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("password: must be at least 8 characters"));
    }
}
