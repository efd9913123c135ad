// HTTP API Error Types
use axum::{
    extract::rejection::{FormRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::services::ClaimsError;
use crate::store::StoreError;
use crate::views;

/// Message shown for every backend failure; details stay in the logs.
pub const TRANSIENT_ERROR_MESSAGE: &str =
    "error occurred during database update. Please try again after a few minutes.";

/// Route-level failure, rendered as a redirect or an HTML page.
#[derive(Debug)]
pub enum ApiError {
    // Missing, malformed, expired or revoked session: send the user to log in
    Unauthenticated,

    // Valid session, wrong role
    Forbidden,

    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    NotFound,

    // 503 Service Unavailable (store or identity provider failing)
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::SEE_OTHER,
            ApiError::Forbidden => StatusCode::SEE_OTHER,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated => "login required",
            ApiError::Forbidden => "unauthorized",
            ApiError::BadRequest(msg) => msg,
            ApiError::NotFound => "not found",
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn service_unavailable() -> Self {
        ApiError::ServiceUnavailable(TRANSIENT_ERROR_MESSAGE.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // Log the real error but return generic message
        tracing::error!("Document store error: {}", err);
        ApiError::service_unavailable()
    }
}

impl From<ClaimsError> for ApiError {
    fn from(err: ClaimsError) -> Self {
        tracing::error!("Claims issuance error: {}", err);
        ApiError::service_unavailable()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!("Rejected query string: {}", rejection.body_text());
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        tracing::debug!("Rejected form body: {}", rejection.body_text());
        ApiError::bad_request(rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated => Redirect::to("/login").into_response(),
            ApiError::Forbidden => Redirect::to("/unauthorized").into_response(),
            ApiError::NotFound => (StatusCode::NOT_FOUND, views::not_found()).into_response(),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, views::error_page("Bad Request", &msg)).into_response()
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                views::error_page("Service Unavailable", &msg),
            )
                .into_response(),
        }
    }
}
