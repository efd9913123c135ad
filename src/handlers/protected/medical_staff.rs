// handlers/protected/medical_staff.rs - GET/POST /medicalStaff
use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Extension, Form, Query, State,
    },
    response::{Html, Redirect},
};
use tracing::info;

use super::{decode_all, require_medical_staff, ListParams};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{Order, OrderRequest, PromotionForm};
use crate::store::{collections, to_document, PageRequest, WriteBatch};
use crate::views;

/// GET /medicalStaff - one page of pending order requests.
pub async fn medical_staff_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Html<String>, ApiError> {
    require_medical_staff(&user)?;
    let Query(params) = params?;

    let limit = state.config.page_size(params.limit);
    let page = state
        .store
        .list(
            collections::ORDER_REQUESTS,
            &PageRequest {
                cursor: params.cursor(),
                limit,
            },
        )
        .await?;

    let next_cursor = page.next_cursor.clone();
    let records: Vec<OrderRequest> = decode_all(page.documents)?;

    Ok(views::medical_staff(&user.name, &records, next_cursor.as_deref(), limit))
}

/// POST /medicalStaff - promote a pending request to an order.
///
/// The delete and the set commit together; a failure leaves both
/// collections untouched.
pub async fn medical_staff_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    form: Result<Form<PromotionForm>, FormRejection>,
) -> Result<Redirect, ApiError> {
    require_medical_staff(&user)?;
    let Form(form) = form?;

    if form.doc_id.trim().is_empty() {
        return Err(ApiError::bad_request("docId is required"));
    }

    let order = Order::promote(form, &user)?;
    let batch = WriteBatch::new()
        .delete(collections::ORDER_REQUESTS, order.doc_id())
        .set(collections::ORDERS, order.doc_id(), to_document(&order)?);

    let result = state.store.commit(batch).await?;
    info!(
        doc_id = %order.doc_id(),
        prescribed_by = %user.uid,
        write_time = %result.write_time,
        "Order request promoted"
    );

    Ok(Redirect::to("/medicalStaff"))
}
