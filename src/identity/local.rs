use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{IdentityError, IdentityProvider};
use crate::auth::{DecodedClaims, RoleClaim};
use crate::config::SessionConfig;
use crate::store::{collections, from_document, to_document, DocumentStore};

/// Account record kept per uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    uid: String,
    email: String,
    name: String,
    #[serde(default)]
    custom_claims: Option<RoleClaim>,
    /// Bumped on revocation; tokens minted under an older value are revoked
    #[serde(default)]
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TokenUse {
    Id,
    Session,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    email: String,
    name: String,
    #[serde(flatten)]
    role: RoleClaim,
    gen: u64,
    token_use: TokenUse,
    iss: String,
    iat: i64,
    exp: i64,
    auth_time: i64,
}

impl From<TokenClaims> for DecodedClaims {
    fn from(claims: TokenClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }
}

/// Self-contained identity provider issuing HS256 tokens.
///
/// ID tokens snapshot the account's custom claims when minted and session
/// cookies copy them from the ID token, so a claims change shows up only
/// after the next sign-in.
pub struct LocalIdentityProvider {
    accounts: Arc<dyn DocumentStore>,
    issuer: String,
    id_token_ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    write_lock: Mutex<()>,
}

impl LocalIdentityProvider {
    pub fn new(config: &SessionConfig, accounts: Arc<dyn DocumentStore>) -> Self {
        Self {
            accounts,
            issuer: config.issuer.clone(),
            id_token_ttl: Duration::from_secs(config.id_token_ttl_secs),
            encoding_key: EncodingKey::from_secret(config.signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.signing_secret.as_bytes()),
            write_lock: Mutex::new(()),
        }
    }

    /// Client-side sign-in: create the account on first use and hand back an ID token.
    pub async fn sign_in(&self, uid: &str, email: &str, name: &str) -> Result<String, IdentityError> {
        if uid.trim().is_empty() {
            return Err(IdentityError::InvalidToken("uid must not be empty".to_string()));
        }

        let account = {
            let _guard = self.write_lock.lock().await;
            let account = match self.load_account(uid).await? {
                Some(mut existing) => {
                    existing.email = email.to_string();
                    existing.name = name.to_string();
                    existing
                }
                None => {
                    info!("Creating identity account for {}", uid);
                    Account {
                        uid: uid.to_string(),
                        email: email.to_string(),
                        name: name.to_string(),
                        custom_claims: None,
                        generation: 0,
                    }
                }
            };
            self.save_account(&account).await?;
            account
        };

        let now = Utc::now().timestamp();
        self.mint(
            TokenClaims {
                sub: account.uid,
                email: account.email,
                name: account.name,
                role: account.custom_claims.unwrap_or_default(),
                gen: account.generation,
                token_use: TokenUse::Id,
                iss: self.issuer.clone(),
                iat: now,
                exp: now + self.id_token_ttl.as_secs() as i64,
                auth_time: now,
            },
        )
    }

    async fn load_account(&self, uid: &str) -> Result<Option<Account>, IdentityError> {
        match self.accounts.get(collections::IDENTITY_ACCOUNTS, uid).await? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    async fn require_account(&self, uid: &str) -> Result<Account, IdentityError> {
        self.load_account(uid)
            .await?
            .ok_or_else(|| IdentityError::UserNotFound(uid.to_string()))
    }

    async fn save_account(&self, account: &Account) -> Result<(), IdentityError> {
        self.accounts
            .set(collections::IDENTITY_ACCOUNTS, &account.uid, to_document(account)?)
            .await?;
        Ok(())
    }

    fn mint(&self, claims: TokenClaims) -> Result<String, IdentityError> {
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| IdentityError::Unavailable(format!("token signing failed: {}", e)))
    }

    fn decode_token(&self, token: &str, expected: TokenUse) -> Result<TokenClaims, IdentityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => IdentityError::Expired,
            _ => IdentityError::InvalidToken(e.to_string()),
        })?;

        if data.claims.token_use != expected {
            return Err(IdentityError::InvalidToken(format!(
                "expected {:?} token, got {:?}",
                expected, data.claims.token_use
            )));
        }

        Ok(data.claims)
    }

    async fn ensure_not_revoked(&self, claims: &TokenClaims) -> Result<(), IdentityError> {
        let account = self.require_account(&claims.sub).await?;
        if claims.gen < account.generation {
            debug!("Rejecting revoked token for {}", claims.sub);
            return Err(IdentityError::Revoked);
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn verify_id_token(&self, id_token: &str) -> Result<DecodedClaims, IdentityError> {
        let claims = self.decode_token(id_token, TokenUse::Id)?;
        self.ensure_not_revoked(&claims).await?;
        Ok(claims.into())
    }

    async fn create_session_cookie(&self, id_token: &str, expires_in: Duration) -> Result<String, IdentityError> {
        let id_claims = self.decode_token(id_token, TokenUse::Id)?;
        self.ensure_not_revoked(&id_claims).await?;

        let now = Utc::now().timestamp();
        self.mint(TokenClaims {
            token_use: TokenUse::Session,
            iat: now,
            exp: now + expires_in.as_secs() as i64,
            ..id_claims
        })
    }

    async fn verify_session_cookie(&self, token: &str, check_revoked: bool) -> Result<DecodedClaims, IdentityError> {
        let claims = self.decode_token(token, TokenUse::Session)?;
        if check_revoked {
            self.ensure_not_revoked(&claims).await?;
        }
        Ok(claims.into())
    }

    async fn set_custom_claims(&self, uid: &str, claims: RoleClaim) -> Result<(), IdentityError> {
        let _guard = self.write_lock.lock().await;
        let mut account = self.require_account(uid).await?;
        account.custom_claims = Some(claims);
        self.save_account(&account).await
    }

    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), IdentityError> {
        let _guard = self.write_lock.lock().await;
        let mut account = self.require_account(uid).await?;
        account.generation += 1;
        self.save_account(&account).await?;
        info!("Revoked sessions for {}", uid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::MemoryStore;

    const FIVE_DAYS: Duration = Duration::from_secs(5 * 24 * 60 * 60);

    fn provider() -> LocalIdentityProvider {
        LocalIdentityProvider::new(&AppConfig::development().session, Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn session_round_trip() {
        let idp = provider();
        let id_token = idp.sign_in("u1", "u1@example.com", "User One").await.unwrap();

        let id_claims = idp.verify_id_token(&id_token).await.unwrap();
        assert_eq!(id_claims.uid, "u1");

        let session = idp.create_session_cookie(&id_token, FIVE_DAYS).await.unwrap();
        let claims = idp.verify_session_cookie(&session, true).await.unwrap();
        assert_eq!(claims.uid, "u1");
        assert_eq!(claims.email, "u1@example.com");
        assert_eq!(claims.name, "User One");
        assert_eq!(claims.role, RoleClaim::default());
    }

    #[tokio::test]
    async fn id_token_is_not_a_session() {
        let idp = provider();
        let id_token = idp.sign_in("u1", "u1@example.com", "User One").await.unwrap();

        let err = idp.verify_session_cookie(&id_token, false).await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidToken(_)));

        let session = idp.create_session_cookie(&id_token, FIVE_DAYS).await.unwrap();
        assert!(idp.create_session_cookie(&session, FIVE_DAYS).await.is_err());
    }

    #[tokio::test]
    async fn garbage_and_empty_tokens_are_rejected() {
        let idp = provider();
        assert!(matches!(
            idp.verify_session_cookie("", true).await.unwrap_err(),
            IdentityError::InvalidToken(_)
        ));
        assert!(matches!(
            idp.verify_session_cookie("not.a.jwt", true).await.unwrap_err(),
            IdentityError::InvalidToken(_)
        ));
    }

    #[tokio::test]
    async fn foreign_signing_key_is_rejected() {
        let idp = provider();
        let mut other_config = AppConfig::development().session;
        other_config.signing_secret = "someone-else".to_string();
        let other = LocalIdentityProvider::new(&other_config, Arc::new(MemoryStore::new()));

        let id_token = other.sign_in("u1", "u1@example.com", "User One").await.unwrap();
        let session = other.create_session_cookie(&id_token, FIVE_DAYS).await.unwrap();

        assert!(idp.verify_session_cookie(&session, false).await.is_err());
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let idp = provider();
        idp.sign_in("u1", "u1@example.com", "User One").await.unwrap();

        let now = Utc::now().timestamp();
        let expired = idp
            .mint(TokenClaims {
                sub: "u1".to_string(),
                email: "u1@example.com".to_string(),
                name: "User One".to_string(),
                role: RoleClaim::PATIENT,
                gen: 0,
                token_use: TokenUse::Session,
                iss: idp.issuer.clone(),
                iat: now - 120,
                exp: now - 60,
                auth_time: now - 120,
            })
            .unwrap();

        assert!(matches!(
            idp.verify_session_cookie(&expired, false).await.unwrap_err(),
            IdentityError::Expired
        ));
    }

    #[tokio::test]
    async fn revocation_invalidates_existing_sessions() {
        let idp = provider();
        let id_token = idp.sign_in("u1", "u1@example.com", "User One").await.unwrap();
        let session = idp.create_session_cookie(&id_token, FIVE_DAYS).await.unwrap();

        idp.revoke_refresh_tokens("u1").await.unwrap();

        assert!(matches!(
            idp.verify_session_cookie(&session, true).await.unwrap_err(),
            IdentityError::Revoked
        ));
        // Signature and expiry alone still pass
        assert!(idp.verify_session_cookie(&session, false).await.is_ok());
        // The old ID token can no longer be exchanged
        assert!(matches!(
            idp.create_session_cookie(&id_token, FIVE_DAYS).await.unwrap_err(),
            IdentityError::Revoked
        ));

        // A fresh sign-in works again
        let id_token = idp.sign_in("u1", "u1@example.com", "User One").await.unwrap();
        let session = idp.create_session_cookie(&id_token, FIVE_DAYS).await.unwrap();
        assert!(idp.verify_session_cookie(&session, true).await.is_ok());
    }

    #[tokio::test]
    async fn custom_claims_apply_from_next_sign_in() {
        let idp = provider();
        let first = idp.sign_in("u1", "u1@example.com", "User One").await.unwrap();

        idp.set_custom_claims("u1", RoleClaim::MEDICAL_STAFF).await.unwrap();

        let session = idp.create_session_cookie(&first, FIVE_DAYS).await.unwrap();
        let claims = idp.verify_session_cookie(&session, true).await.unwrap();
        assert_eq!(claims.role, RoleClaim::default());

        let second = idp.sign_in("u1", "u1@example.com", "User One").await.unwrap();
        let session = idp.create_session_cookie(&second, FIVE_DAYS).await.unwrap();
        let claims = idp.verify_session_cookie(&session, true).await.unwrap();
        assert_eq!(claims.role, RoleClaim::MEDICAL_STAFF);
    }

    #[tokio::test]
    async fn unknown_users_cannot_receive_claims() {
        let idp = provider();
        assert!(matches!(
            idp.set_custom_claims("ghost", RoleClaim::PATIENT).await.unwrap_err(),
            IdentityError::UserNotFound(_)
        ));
        assert!(matches!(
            idp.revoke_refresh_tokens("ghost").await.unwrap_err(),
            IdentityError::UserNotFound(_)
        ));
    }
}
