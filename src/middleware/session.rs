use axum::{
    extract::{Request, State},
    http::{header::COOKIE, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::app::AppState;
use crate::auth::{token_from_cookie_header, AuthUser};
use crate::error::ApiError;

/// Session cookie value from the request headers, or an empty string.
///
/// HTTP/2 clients may send one `Cookie` header per cookie, so every header
/// is searched.
pub fn session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> &'a str {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find_map(|cookie_header| token_from_cookie_header(cookie_header, cookie_name))
        .unwrap_or("")
}

/// Session middleware for protected routes.
///
/// Verifies the session cookie with revocation checking and injects the
/// decoded claims as [`AuthUser`]. Any verification failure redirects to the
/// login page instead of surfacing an error.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = session_token(request.headers(), &state.config.session.cookie_name).to_string();

    match state.identity.verify_session_cookie(&token, true).await {
        Ok(claims) => {
            let user: AuthUser = claims;
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            debug!("Session verification failed: {}", e);
            ApiError::Unauthenticated.into_response()
        }
    }
}
