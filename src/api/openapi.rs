//! OpenAPI document served at `/docs`.
//!
//! Register new endpoints here so the generated spec stays in sync with the
//! router in `api::new`.

use utoipa::OpenApi;

use super::handlers::{auth, health};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register::register,
        auth::login::login,
        auth::login::login_google,
        auth::refresh::refresh,
        auth::password_reset::forgot_password,
        auth::password_reset::reset_password,
        auth::verification::request_verification,
        auth::verification::confirm_verification,
        auth::session::session,
    ),
    components(schemas(
        auth::types::RegisterRequest,
        auth::types::LoginRequest,
        auth::types::FederatedLoginRequest,
        auth::types::RefreshRequest,
        auth::types::ForgotPasswordRequest,
        auth::types::ResetPasswordRequest,
        auth::types::EmailVerificationRequest,
        auth::types::ConfirmEmailRequest,
        auth::types::TokenPair,
        auth::types::AccountResponse,
        auth::types::AuthResponse,
        auth::types::OkResponse,
    )),
    tags(
        (name = "auth", description = "Credential and session lifecycle flows"),
        (name = "health", description = "Service health")
    )
)]
pub(super) struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn document_lists_every_flow() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/health",
            "/v1/auth/register",
            "/v1/auth/login",
            "/v1/auth/login/google",
            "/v1/auth/refresh",
            "/v1/auth/forgot-password",
            "/v1/auth/reset-password",
            "/v1/auth/verify-email/request",
            "/v1/auth/verify-email/confirm",
            "/v1/auth/session",
        ] {
            assert!(
                paths.iter().any(|path| path.as_str() == expected),
                "missing path {expected}"
            );
        }
    }
}
