use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order_request::parse_symptom_days;
use super::OrderRequest;
use crate::auth::AuthUser;
use crate::error::ApiError;

/// A fulfilled request (`orders` collection), keyed by the originating request's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(flatten)]
    pub request: OrderRequest,
    pub prescribed_by_name: String,
    pub prescribed_by_email: String,
}

/// Promotion form posted from the staff page: the request's fields as rendered.
///
/// The values are copied into the order as submitted; they are not checked
/// against the stored request, only for being well-formed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionForm {
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub deliver_to: String,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub symptom_days: String,
    #[serde(default)]
    pub requested_at: String,
}

impl Order {
    /// Build the order for `form`, rejecting values that would not survive
    /// the copy unchanged. A blank `requestedAt` is kept absent.
    pub fn promote(form: PromotionForm, staff: &AuthUser) -> Result<Self, ApiError> {
        let symptom_days = parse_symptom_days(&form.symptom_days)
            .ok_or_else(|| ApiError::bad_request("symptomDays must be a whole number of days"))?;

        let requested_at = match form.requested_at.trim() {
            "" => None,
            value => Some(
                DateTime::parse_from_rfc3339(value)
                    .map_err(|_| ApiError::bad_request("requestedAt must be an RFC 3339 timestamp"))?
                    .with_timezone(&Utc),
            ),
        };

        Ok(Self {
            request: OrderRequest {
                doc_id: form.doc_id,
                name: form.name,
                email: form.email,
                deliver_to: form.deliver_to,
                symptoms: form.symptoms,
                symptom_days,
                requested_at,
            },
            prescribed_by_name: staff.name.clone(),
            prescribed_by_email: staff.email.clone(),
        })
    }

    pub fn doc_id(&self) -> &str {
        &self.request.doc_id
    }
}
