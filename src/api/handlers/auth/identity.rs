//! Federated identity assertions and the account linking policy.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::error::AuthError;
use super::storage::AccountRecord;
use crate::APP_USER_AGENT;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// A verified claim of an external account's identity.
#[derive(Clone, Debug)]
pub struct IdentityAssertion {
    pub email: String,
    pub email_verified: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub display_name: Option<String>,
    pub picture: Option<String>,
}

/// External verifier for identity assertions. Forged, stale, or misdirected
/// assertions are rejected here and surface as `Unauthorized`.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, assertion_token: &str) -> Result<IdentityAssertion, AuthError>;
}

/// Verifies Google ID tokens against the tokeninfo endpoint and checks the
/// audience against the configured client id.
pub struct GoogleTokenVerifier {
    client: Client,
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    email: Option<String>,
    email_verified: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleTokenVerifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(client_id: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build identity verifier client")?;
        Ok(Self { client, client_id })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleTokenVerifier {
    async fn verify(&self, assertion_token: &str) -> Result<IdentityAssertion, AuthError> {
        let response = self
            .client
            .get(GOOGLE_TOKENINFO_URL)
            .query(&[("id_token", assertion_token)])
            .send()
            .await
            .map_err(|err| {
                AuthError::Internal(
                    anyhow::Error::new(err).context("identity verifier request failed"),
                )
            })?;

        // The endpoint answers non-200 for any invalid or expired token.
        if response.status() != StatusCode::OK {
            return Err(AuthError::Unauthorized);
        }

        let info: TokenInfo = response.json().await.map_err(|_| AuthError::Unauthorized)?;
        assertion_from_info(info, &self.client_id)
    }
}

fn assertion_from_info(info: TokenInfo, client_id: &str) -> Result<IdentityAssertion, AuthError> {
    // A token minted for another application must not authenticate here.
    if info.aud != client_id {
        return Err(AuthError::Unauthorized);
    }
    let Some(email) = info.email else {
        return Err(AuthError::Unauthorized);
    };
    Ok(IdentityAssertion {
        email,
        email_verified: info.email_verified.as_deref() == Some("true"),
        given_name: info.given_name,
        family_name: info.family_name,
        display_name: info.name,
        picture: info.picture,
    })
}

/// Profile values to apply to an existing account after a federated login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct ProfilePatch {
    pub(super) firstname: Option<String>,
    pub(super) lastname: Option<String>,
    pub(super) name: Option<String>,
    pub(super) picture: Option<String>,
    pub(super) mark_verified: bool,
}

/// The local account is authoritative once populated: assertion data only
/// backfills fields that are currently null, and the verified timestamp is
/// only set when it was previously unset and the assertion claims it.
pub(super) fn merge_profile(
    account: &AccountRecord,
    assertion: &IdentityAssertion,
) -> ProfilePatch {
    ProfilePatch {
        firstname: account
            .firstname
            .clone()
            .or_else(|| assertion.given_name.clone()),
        lastname: account
            .lastname
            .clone()
            .or_else(|| assertion.family_name.clone()),
        name: account
            .name
            .clone()
            .or_else(|| assertion.display_name.clone()),
        picture: account.picture.clone().or_else(|| assertion.picture.clone()),
        mark_verified: account.email_verified_at.is_none() && assertion.email_verified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn account() -> AccountRecord {
        AccountRecord {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            password_hash: None,
            firstname: Some("Alice".to_string()),
            lastname: None,
            name: None,
            organisation: None,
            language: "fr".to_string(),
            picture: None,
            email_verified_at: None,
        }
    }

    fn assertion() -> IdentityAssertion {
        IdentityAssertion {
            email: "alice@example.com".to_string(),
            email_verified: true,
            given_name: Some("Alicia".to_string()),
            family_name: Some("Martin".to_string()),
            display_name: Some("Alicia Martin".to_string()),
            picture: Some("https://lh3.example.com/photo.jpg".to_string()),
        }
    }

    #[test]
    fn merge_backfills_only_null_fields() {
        let patch = merge_profile(&account(), &assertion());
        // Existing firstname wins; the rest was null and gets backfilled.
        assert_eq!(patch.firstname.as_deref(), Some("Alice"));
        assert_eq!(patch.lastname.as_deref(), Some("Martin"));
        assert_eq!(patch.name.as_deref(), Some("Alicia Martin"));
        assert_eq!(patch.picture.as_deref(), Some("https://lh3.example.com/photo.jpg"));
        assert!(patch.mark_verified);
    }

    #[test]
    fn merge_never_unsets_verification() {
        let mut verified = account();
        verified.email_verified_at = Some(Utc::now());
        let patch = merge_profile(&verified, &assertion());
        assert!(!patch.mark_verified);

        let mut unverified_claim = assertion();
        unverified_claim.email_verified = false;
        let patch = merge_profile(&account(), &unverified_claim);
        assert!(!patch.mark_verified);
    }

    fn info() -> TokenInfo {
        TokenInfo {
            aud: "client-id".to_string(),
            email: Some("alice@example.com".to_string()),
            email_verified: Some("true".to_string()),
            given_name: Some("Alice".to_string()),
            family_name: None,
            name: None,
            picture: None,
        }
    }

    #[test]
    fn assertion_requires_matching_audience() {
        assert!(matches!(
            assertion_from_info(info(), "other-client"),
            Err(AuthError::Unauthorized)
        ));
        assert!(assertion_from_info(info(), "client-id").is_ok());
    }

    #[test]
    fn assertion_requires_an_email() {
        let mut missing_email = info();
        missing_email.email = None;
        assert!(matches!(
            assertion_from_info(missing_email, "client-id"),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn email_verified_claim_is_parsed_strictly() {
        let verified = assertion_from_info(info(), "client-id").unwrap();
        assert!(verified.email_verified);

        let mut unverified = info();
        unverified.email_verified = Some("false".to_string());
        assert!(!assertion_from_info(unverified, "client-id")
            .unwrap()
            .email_verified);

        let mut absent = info();
        absent.email_verified = None;
        assert!(!assertion_from_info(absent, "client-id")
            .unwrap()
            .email_verified);
    }

    #[test]
    fn tokeninfo_payload_deserializes() {
        let info: TokenInfo = serde_json::from_str(
            r#"{
                "aud": "client-id",
                "email": "alice@example.com",
                "email_verified": "true",
                "given_name": "Alice",
                "family_name": "Martin",
                "name": "Alice Martin",
                "picture": "https://lh3.example.com/photo.jpg"
            }"#,
        )
        .unwrap();
        assert_eq!(info.aud, "client-id");
        assert_eq!(info.email.as_deref(), Some("alice@example.com"));
    }
}
