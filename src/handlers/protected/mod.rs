// handlers/protected/mod.rs - Handlers behind the session middleware
//
// Every handler here receives the verified claims as `Extension<AuthUser>`
// and checks the role it needs before touching the store.
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::ApiError;

pub mod medical_staff;
pub mod orders;
pub mod patient;

/// `?cursor=&limit=` for the staff-facing listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

impl ListParams {
    /// Empty cursors (`?cursor=`) mean the first page.
    pub fn cursor(&self) -> Option<String> {
        self.cursor.clone().filter(|c| !c.is_empty())
    }
}

pub(crate) fn require_patient(user: &AuthUser) -> Result<(), ApiError> {
    if user.is_patient() {
        Ok(())
    } else {
        tracing::debug!("uid {} lacks the patient role", user.uid);
        Err(ApiError::Forbidden)
    }
}

pub(crate) fn require_medical_staff(user: &AuthUser) -> Result<(), ApiError> {
    if user.is_medical_staff() {
        Ok(())
    } else {
        tracing::debug!("uid {} lacks the medical staff role", user.uid);
        Err(ApiError::Forbidden)
    }
}

pub(crate) fn decode_all<T: serde::de::DeserializeOwned>(
    documents: Vec<crate::store::Document>,
) -> Result<Vec<T>, crate::store::StoreError> {
    documents.into_iter().map(crate::store::from_document).collect()
}
