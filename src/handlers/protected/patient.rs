// handlers/protected/patient.rs - GET/POST /patient
use axum::{
    extract::{rejection::FormRejection, Extension, Form, State},
    response::{Html, Redirect},
};
use chrono::Utc;
use tracing::info;

use super::{decode_all, require_patient};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{OrderRequest, PatientSubmission};
use crate::store::{collections, Direction, Query};
use crate::views;

/// GET /patient - the caller's most recent pending requests, newest first.
///
/// Matches on the session's email, so requests follow the email rather than
/// the uid.
pub async fn patient_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Html<String>, ApiError> {
    require_patient(&user)?;

    let query = Query::new()
        .where_eq("email", user.email.clone())
        .order_by("requestedAt", Direction::Descending)
        .limit(state.config.listing.patient_recent_limit);

    let documents = state.store.query(collections::ORDER_REQUESTS, &query).await?;
    let records: Vec<OrderRequest> = decode_all(documents)?;

    Ok(views::patient(&records))
}

/// POST /patient - record a new delivery request for the caller.
///
/// Name and email come from the session, never from the form. `requestedAt`
/// is assigned by the store.
pub async fn patient_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    submission: Result<Form<PatientSubmission>, FormRejection>,
) -> Result<Redirect, ApiError> {
    require_patient(&user)?;
    let Form(submission) = submission?;

    let symptom_days = submission
        .parse_symptom_days()
        .ok_or_else(|| ApiError::bad_request("symptomDays must be a whole number of days"))?;

    let request = OrderRequest::from_submission(&user, submission, symptom_days, Utc::now());
    let result = state
        .store
        .set(collections::ORDER_REQUESTS, &request.doc_id, request.to_new_document()?)
        .await?;

    info!(doc_id = %request.doc_id, write_time = %result.write_time, "Order request written");
    Ok(Redirect::to("/patient"))
}
