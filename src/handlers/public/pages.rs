// handlers/public/pages.rs - Unauthenticated pages and health
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::app::AppState;
use crate::store::format_timestamp;
use crate::views;

pub async fn home() -> Html<String> {
    views::home()
}

pub async fn login(State(state): State<AppState>) -> Html<String> {
    views::login(state.dev_sign_in.is_some())
}

/// GET /unauthorized - landing page for role failures, served with 403.
pub async fn unauthorized() -> impl IntoResponse {
    (StatusCode::FORBIDDEN, views::unauthorized())
}

/// Fallback for every unmatched route.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, views::not_found())
}

/// GET /health - document store reachability.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = format_timestamp(chrono::Utc::now());

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": timestamp,
                    "store": "ok",
                }
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "data": {
                        "status": "degraded",
                        "timestamp": timestamp,
                        "store": "unavailable",
                    }
                })),
            )
        }
    }
}
