//! Identity provider seam.
//!
//! The application never authenticates users itself. It exchanges and
//! verifies tokens issued by an [`IdentityProvider`] and pushes role claims
//! back to it.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{DecodedClaims, RoleClaim};
use crate::store::StoreError;

pub mod local;

pub use local::LocalIdentityProvider;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    Expired,

    #[error("Token revoked")]
    Revoked,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        IdentityError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a short-lived ID token obtained by the client at sign-in.
    async fn verify_id_token(&self, id_token: &str) -> Result<DecodedClaims, IdentityError>;

    /// Exchange an ID token for a session token valid for `expires_in`.
    async fn create_session_cookie(&self, id_token: &str, expires_in: Duration) -> Result<String, IdentityError>;

    /// Verify a session token; with `check_revoked` the identity's revocation
    /// state is consulted as well.
    async fn verify_session_cookie(&self, token: &str, check_revoked: bool) -> Result<DecodedClaims, IdentityError>;

    /// Replace the identity's custom claims. Takes effect on tokens issued afterwards.
    async fn set_custom_claims(&self, uid: &str, claims: RoleClaim) -> Result<(), IdentityError>;

    /// Invalidate every session derived from tokens issued so far.
    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), IdentityError>;
}
