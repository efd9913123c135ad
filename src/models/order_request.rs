use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::store::{server_timestamp, to_document, Document, StoreError};

/// A patient's pending delivery request (`orderRequests` collection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub doc_id: String,
    pub name: String,
    pub email: String,
    pub deliver_to: String,
    pub symptoms: String,
    pub symptom_days: i64,
    /// Assigned by the store at write time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<DateTime<Utc>>,
}

/// Fields a patient submits from the patient page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSubmission {
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub symptom_days: String,
    #[serde(default)]
    pub deliver_to: String,
}

impl PatientSubmission {
    pub fn parse_symptom_days(&self) -> Option<i64> {
        parse_symptom_days(&self.symptom_days)
    }
}

/// Whole number of days, zero or more.
pub fn parse_symptom_days(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok().filter(|days| *days >= 0)
}

/// Natural key: the submitter's uid plus the submission time in milliseconds.
pub fn request_doc_id(uid: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", uid, at.timestamp_millis())
}

impl OrderRequest {
    pub fn from_submission(user: &AuthUser, submission: PatientSubmission, symptom_days: i64, at: DateTime<Utc>) -> Self {
        Self {
            doc_id: request_doc_id(&user.uid, at),
            name: user.name.clone(),
            email: user.email.clone(),
            deliver_to: submission.deliver_to,
            symptoms: submission.symptoms,
            symptom_days,
            requested_at: None,
        }
    }

    /// Document body with `requestedAt` left for the store to fill in.
    pub fn to_new_document(&self) -> Result<Document, StoreError> {
        let mut doc = to_document(self)?;
        doc.insert("requestedAt".to_string(), server_timestamp());
        Ok(doc)
    }
}
