use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{collections, from_document, server_timestamp, to_document, DocumentStore, PageRequest, StoreError};

/// Registry record keyed by uid. Presence alone marks a user as medical staff;
/// the fields are informational.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffEntry {
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

/// Read side used by the claims issuer.
pub async fn is_registered(store: &dyn DocumentStore, uid: &str) -> Result<bool, StoreError> {
    Ok(store.get(collections::MEDICAL_STAFFS, uid).await?.is_some())
}

/// Register a uid as medical staff. Used by startup seeding and `carectl`.
pub async fn register(
    store: &dyn DocumentStore,
    uid: &str,
    name: Option<String>,
    email: Option<String>,
) -> Result<(), StoreError> {
    let entry = StaffEntry {
        uid: uid.to_string(),
        name,
        email,
        registered_at: None,
    };
    let mut doc = to_document(&entry)?;
    doc.insert("registeredAt".to_string(), server_timestamp());
    store.set(collections::MEDICAL_STAFFS, uid, doc).await?;
    Ok(())
}

pub async fn unregister(store: &dyn DocumentStore, uid: &str) -> Result<(), StoreError> {
    store.delete(collections::MEDICAL_STAFFS, uid).await?;
    Ok(())
}

/// Every registry entry, walked page by page.
pub async fn list(store: &dyn DocumentStore, page_size: usize) -> Result<Vec<StaffEntry>, StoreError> {
    let mut entries = Vec::new();
    let mut cursor = None;
    loop {
        let page = store
            .list(collections::MEDICAL_STAFFS, &PageRequest { cursor, limit: page_size })
            .await?;
        for doc in page.documents {
            entries.push(from_document(doc)?);
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => return Ok(entries),
        }
    }
}
