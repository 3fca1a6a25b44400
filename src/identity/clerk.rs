// src/identity/clerk.rs

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use super::{Identity, IdentityBridge, IdentityProbe};
use crate::{
    config::{Config, ConfigError},
    error::AppError,
    models::learner::{Framework, Theme},
    store::StoreCredential,
    utils::jwt::sign_store_token,
};

/// Public metadata a parent may have set on the account.
#[derive(Debug, Default, Deserialize)]
struct PublicMetadata {
    age: Option<i32>,
    grade: Option<i32>,
    framework: Option<String>,
    theme: Option<String>,
}

/// Claims of a session token issued by the identity provider.
#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
    #[serde(default)]
    metadata: Option<PublicMetadata>,
}

impl SessionClaims {
    fn into_identity(self) -> Identity {
        let metadata = self.metadata.unwrap_or_default();
        Identity {
            id: self.sub,
            age: metadata.age,
            grade: metadata.grade,
            // unknown values are ignored rather than rejecting the session
            framework: metadata.framework.and_then(|f| f.parse::<Framework>().ok()),
            theme: metadata.theme.and_then(|t| t.parse::<Theme>().ok()),
        }
    }
}

/// Derives the session issuer from a publishable key.
///
/// The key is `pk_test_` or `pk_live_` followed by the base64 of the
/// frontend API host with a trailing `$`.
pub fn issuer_from_publishable_key(key: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        var: "CLERK_PUBLISHABLE_KEY",
        reason: reason.to_string(),
    };

    let encoded = key
        .strip_prefix("pk_test_")
        .or_else(|| key.strip_prefix("pk_live_"))
        .ok_or_else(|| invalid("expected a pk_test_ or pk_live_ key"))?;

    let decoded = STANDARD_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| invalid(&e.to_string()))?;
    let host = String::from_utf8(decoded).map_err(|e| invalid(&e.to_string()))?;
    let host = host.trim_end_matches('$');

    if host.is_empty() {
        return Err(invalid("key does not encode a host"));
    }
    Ok(format!("https://{}", host))
}

/// Identity bridge backed by Clerk session tokens.
///
/// Session tokens are verified locally against the instance's PEM key.
/// Store credentials are signed with the data store's JWT secret, the same
/// token a Clerk JWT template for the store would hand out.
#[derive(Clone)]
pub struct ClerkBridge {
    issuer: String,
    decoding_key: DecodingKey,
    store_secret: String,
    store_token_ttl: u64,
}

impl ClerkBridge {
    pub fn new(
        publishable_key: &str,
        jwt_key_pem: &str,
        store_secret: impl Into<String>,
        store_token_ttl: u64,
    ) -> Result<Self, ConfigError> {
        let issuer = issuer_from_publishable_key(publishable_key)?;
        let decoding_key =
            DecodingKey::from_rsa_pem(jwt_key_pem.as_bytes()).map_err(|e| ConfigError::Invalid {
                var: "CLERK_JWT_KEY",
                reason: e.to_string(),
            })?;

        Ok(Self {
            issuer,
            decoding_key,
            store_secret: store_secret.into(),
            store_token_ttl,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(
            &config.clerk_publishable_key,
            &config.clerk_jwt_key,
            config.store_jwt_secret.clone(),
            config.store_token_ttl,
        )
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

#[async_trait]
impl IdentityBridge for ClerkBridge {
    async fn current_user(&self, session_token: &str) -> Result<IdentityProbe, AppError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        // session tokens carry no audience
        validation.validate_aud = false;

        match decode::<SessionClaims>(session_token, &self.decoding_key, &validation) {
            Ok(data) => Ok(IdentityProbe::signed_in(data.claims.into_identity())),
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                Ok(IdentityProbe::signed_out())
            }
        }
    }

    async fn mint_store_credential(
        &self,
        identity: &Identity,
    ) -> Result<Option<StoreCredential>, AppError> {
        let credential = sign_store_token(&identity.id, &self.store_secret, self.store_token_ttl)?;
        Ok(Some(credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use crate::utils::jwt::verify_store_token;

    const SIGNING_KEY: &str = include_str!("../../tests/fixtures/session_signing_key.pem");
    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/session_public_key.pem");
    const PUBLISHABLE_KEY: &str = "pk_test_ZXhhbXBsZS1hcHAtMTIuY2xlcmsuYWNjb3VudHMuZGV2JA==";
    const ISSUER: &str = "https://example-app-12.clerk.accounts.dev";

    fn bridge() -> ClerkBridge {
        ClerkBridge::new(PUBLISHABLE_KEY, PUBLIC_KEY, "store-secret", 600).unwrap()
    }

    fn session_token(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap(),
        )
        .unwrap()
    }

    fn exp() -> i64 {
        chrono::Utc::now().timestamp() + 300
    }

    #[test]
    fn test_issuer_from_publishable_key() {
        assert_eq!(issuer_from_publishable_key(PUBLISHABLE_KEY).unwrap(), ISSUER);
        // unpadded form decodes the same
        assert_eq!(
            issuer_from_publishable_key("pk_live_ZXhhbXBsZS1hcHAtMTIuY2xlcmsuYWNjb3VudHMuZGV2JA")
                .unwrap(),
            ISSUER
        );
        assert!(issuer_from_publishable_key("sk_test_abc").is_err());
        assert!(issuer_from_publishable_key("pk_test_!!!").is_err());
    }

    #[test]
    fn test_rejects_non_rsa_key() {
        assert!(ClerkBridge::new(PUBLISHABLE_KEY, "not a pem", "s", 60).is_err());
    }

    #[tokio::test]
    async fn test_valid_session_reads_metadata() {
        let token = session_token(json!({
            "sub": "user_abc",
            "iss": ISSUER,
            "exp": exp(),
            "metadata": { "age": 10, "grade": 4, "framework": "IB", "theme": "dark" }
        }));

        let probe = bridge().current_user(&token).await.unwrap();
        let identity = probe.require_identity().unwrap();
        assert_eq!(identity.id, "user_abc");
        assert_eq!(identity.age, Some(10));
        assert_eq!(identity.framework, Some(Framework::Ib));
        assert_eq!(identity.theme, Some(Theme::Dark));
    }

    #[tokio::test]
    async fn test_wrong_issuer_is_signed_out() {
        let token = session_token(json!({
            "sub": "user_abc",
            "iss": "https://evil.example.com",
            "exp": exp(),
        }));
        let probe = bridge().current_user(&token).await.unwrap();
        assert!(probe.is_loaded);
        assert!(!probe.is_signed_in);
    }

    #[tokio::test]
    async fn test_expired_session_is_signed_out() {
        let token = session_token(json!({
            "sub": "user_abc",
            "iss": ISSUER,
            "exp": chrono::Utc::now().timestamp() - 3600,
        }));
        let probe = bridge().current_user(&token).await.unwrap();
        assert!(!probe.is_signed_in);
    }

    #[tokio::test]
    async fn test_minted_credential_verifies_with_store_secret() {
        let credential = bridge()
            .mint_store_credential(&Identity::new("user_abc"))
            .await
            .unwrap()
            .unwrap();
        let claims = verify_store_token(&credential.token, "store-secret").unwrap();
        assert_eq!(claims.sub, "user_abc");
    }
}
