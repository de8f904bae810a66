//! Access token signing and refresh credential handling.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::error::AuthError;
use super::state::AuthConfig;
use super::storage;
use super::types::TokenPair;

const REFRESH_SECRET_BYTES: usize = 48;

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issue a compact signed token carrying the account id and an expiration
/// claim.
pub(super) fn issue_access_token(config: &AuthConfig, account_id: Uuid) -> Result<String> {
    let iat = Utc::now().timestamp();
    let claims = AccessClaims {
        sub: account_id.to_string(),
        iat,
        exp: iat + config.access_token_ttl_seconds(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_token_secret().expose_secret().as_bytes()),
    )
    .context("failed to sign access token")
}

/// Check signature and expiration. Bad signature, expired, and malformed all
/// collapse to `Unauthorized`; callers learn nothing more.
pub(super) fn verify_access_token(config: &AuthConfig, token: &str) -> Result<Uuid, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.access_token_secret().expose_secret().as_bytes()),
        &validation,
    )
    .map_err(|_| AuthError::Unauthorized)?;
    Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::Unauthorized)
}

/// Create a new opaque refresh secret.
///
/// The raw value goes to the caller exactly once; only its digest is ever
/// stored or compared.
pub(super) fn generate_refresh_secret() -> Result<String> {
    let mut bytes = [0u8; REFRESH_SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate refresh secret")?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub(super) fn hash_refresh_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

/// Issue an access token plus a fresh refresh credential for the account,
/// inside the caller's transaction.
pub(super) async fn issue_token_pair(
    tx: &mut Transaction<'_, Postgres>,
    config: &AuthConfig,
    account_id: Uuid,
) -> Result<TokenPair> {
    let access_token = issue_access_token(config, account_id)?;
    let refresh_token = generate_refresh_secret()?;
    storage::insert_refresh_token(
        tx,
        account_id,
        &hash_refresh_secret(&refresh_token),
        config.refresh_token_ttl_seconds(),
    )
    .await?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> AuthConfig {
        AuthConfig::new(
            "https://app.fieldpass.dev".to_string(),
            SecretString::from("signing-secret"),
            SecretString::from("otp-secret"),
        )
    }

    #[test]
    fn access_token_round_trips() {
        let config = config();
        let account_id = Uuid::new_v4();
        let token = issue_access_token(&config, account_id).unwrap();
        assert_eq!(verify_access_token(&config, &token).unwrap(), account_id);
    }

    #[test]
    fn access_token_rejected_with_wrong_secret() {
        let token = issue_access_token(&config(), Uuid::new_v4()).unwrap();
        let other = AuthConfig::new(
            "https://app.fieldpass.dev".to_string(),
            SecretString::from("different-secret"),
            SecretString::from("otp-secret"),
        );
        assert!(matches!(
            verify_access_token(&other, &token),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let config = config().with_access_token_ttl_seconds(-60);
        let token = issue_access_token(&config, Uuid::new_v4()).unwrap();
        assert!(matches!(
            verify_access_token(&config, &token),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn malformed_access_token_is_rejected() {
        assert!(matches!(
            verify_access_token(&config(), "not-a-token"),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn token_with_non_uuid_subject_is_rejected() {
        let config = config();
        let claims = AccessClaims {
            sub: "not-a-uuid".to_string(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 60,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("signing-secret".as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            verify_access_token(&config, &token),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn refresh_secret_has_48_bytes_of_entropy() {
        let secret = generate_refresh_secret().unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(secret.as_bytes()).unwrap();
        assert_eq!(decoded.len(), 48);
    }

    #[test]
    fn refresh_secrets_are_unique() {
        let first = generate_refresh_secret().unwrap();
        let second = generate_refresh_secret().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn refresh_digest_is_stable_and_collision_resistant() {
        let first = hash_refresh_secret("secret");
        let second = hash_refresh_secret("secret");
        let different = hash_refresh_secret("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), 32);
    }
}
