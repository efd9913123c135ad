// handlers/protected/orders.rs - GET /orders
use axum::{
    extract::{rejection::QueryRejection, Extension, Query, State},
    response::Html,
};

use super::{decode_all, require_medical_staff, ListParams};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::Order;
use crate::store::{collections, PageRequest};
use crate::views;

/// GET /orders - one page of fulfilled orders, staff only.
pub async fn orders_get(
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
            collections::ORDERS,
            &PageRequest {
                cursor: params.cursor(),
                limit,
            },
        )
        .await?;

    let next_cursor = page.next_cursor.clone();
    let orders: Vec<Order> = decode_all(page.documents)?;

    Ok(views::orders(&orders, next_cursor.as_deref(), limit))
}
