// handlers/public/session.rs - POST /sessionLogin, GET /logout
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::auth::{clear_session_cookie, session_cookie};
use crate::identity::IdentityError;
use crate::middleware::session_token;
use crate::services::{issue_role_claims, ClaimsError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLoginRequest {
    pub uid: String,
    pub id_token: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionLoginResponse {
    pub status: String,
    /// Set when the role claims changed during this login; the client has to
    /// sign in again before the session carries them.
    pub refresh_required: bool,
}

#[derive(Debug, Error)]
enum SessionLoginError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("id token subject {token_uid} does not match uid {uid}")]
    UidMismatch { uid: String, token_uid: String },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Claims(#[from] ClaimsError),
}

struct EstablishedSession {
    token: String,
    refresh_required: bool,
}

/// POST /sessionLogin - exchange an ID token for the session cookie.
///
/// Role claims are issued before the exchange and the login fails if that
/// does. Any failure redirects to `/unauthorized`.
pub async fn session_login(
    State(state): State<AppState>,
    payload: Result<Json<SessionLoginRequest>, JsonRejection>,
) -> Response {
    let result = match payload {
        Ok(Json(request)) => establish_session(&state, &request).await,
        Err(rejection) => Err(SessionLoginError::Malformed(rejection.body_text())),
    };

    match result {
        Ok(session) => (
            AppendHeaders([(SET_COOKIE, session_cookie(&state.config.session, &session.token))]),
            Json(SessionLoginResponse {
                status: "success".to_string(),
                refresh_required: session.refresh_required,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!("Session login failed: {}", e);
            Redirect::to("/unauthorized").into_response()
        }
    }
}

async fn establish_session(
    state: &AppState,
    request: &SessionLoginRequest,
) -> Result<EstablishedSession, SessionLoginError> {
    let id_claims = state.identity.verify_id_token(&request.id_token).await?;
    if id_claims.uid != request.uid {
        return Err(SessionLoginError::UidMismatch {
            uid: request.uid.clone(),
            token_uid: id_claims.uid,
        });
    }

    let role = issue_role_claims(state.identity.as_ref(), state.store.as_ref(), &request.uid).await?;

    let expires_in = Duration::from_secs(state.config.session.max_age_secs());
    let token = state
        .identity
        .create_session_cookie(&request.id_token, expires_in)
        .await?;

    let refresh_required = role != id_claims.role;
    info!(uid = %request.uid, refresh_required, "Session created");

    Ok(EstablishedSession {
        token,
        refresh_required,
    })
}

/// GET /logout - clear the cookie, then revoke the identity's sessions.
///
/// Revocation failures are logged and never change the response.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let cleared = clear_session_cookie(&state.config.session);

    let token = session_token(&headers, &state.config.session.cookie_name);
    if token.is_empty() {
        debug!("Logout without a session cookie");
    } else if let Err(e) = revoke_session(&state, token).await {
        warn!("Session revocation failed during logout: {}", e);
    }

    (AppendHeaders([(SET_COOKIE, cleared)]), Redirect::to("/"))
}

async fn revoke_session(state: &AppState, token: &str) -> Result<(), IdentityError> {
    let claims = state.identity.verify_session_cookie(token, false).await?;
    state.identity.revoke_refresh_tokens(&claims.uid).await?;
    info!(uid = %claims.uid, "Refresh tokens revoked");
    Ok(())
}
