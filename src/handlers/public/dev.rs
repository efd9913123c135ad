// handlers/public/dev.rs - POST /dev/signIn (development only)
//
// Stands in for the client-side identity SDK when the bundled local
// provider is in use. Only routed when ALLOW_DEV_SIGN_IN is on.
use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;
use crate::error::ApiError;
use crate::identity::IdentityError;

#[derive(Debug, Deserialize)]
pub struct DevSignInRequest {
    pub uid: String,
    pub email: String,
    pub name: String,
}

pub async fn dev_sign_in(
    State(state): State<AppState>,
    Json(request): Json<DevSignInRequest>,
) -> Result<Json<Value>, ApiError> {
    let Some(provider) = state.dev_sign_in.as_ref() else {
        return Err(ApiError::NotFound);
    };

    let id_token = provider
        .sign_in(&request.uid, &request.email, &request.name)
        .await
        .map_err(|e| {
            warn!("Development sign-in failed for {}: {}", request.uid, e);
            match e {
                IdentityError::InvalidToken(msg) => ApiError::bad_request(msg),
                _ => ApiError::service_unavailable(),
            }
        })?;

    Ok(Json(json!({ "idToken": id_token })))
}
