use thiserror::Error;
use tracing::info;

use super::staff_registry;
use crate::auth::RoleClaim;
use crate::identity::{IdentityError, IdentityProvider};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("staff registry lookup failed: {0}")]
    Registry(#[from] StoreError),

    #[error("setting custom claims failed: {0}")]
    Identity(#[from] IdentityError),
}

/// Decide the caller's role from the staff registry and push it to the
/// identity provider.
///
/// Completes before returning so a failure can abort session creation. The
/// new claims only appear in tokens minted after this call.
pub async fn issue_role_claims(
    identity: &dyn IdentityProvider,
    store: &dyn DocumentStore,
    uid: &str,
) -> Result<RoleClaim, ClaimsError> {
    let is_staff = staff_registry::is_registered(store, uid).await?;
    let role = RoleClaim::from_registry_presence(is_staff);

    identity.set_custom_claims(uid, role).await?;
    info!(uid, is_medical_staff = role.is_medical_staff, "Issued role claims");

    Ok(role)
}
