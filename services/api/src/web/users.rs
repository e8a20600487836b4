//! services/api/src/web/users.rs
//!
//! The user profile/status document.

use crate::error::{ApiError, ApiResult};
use crate::web::rest::{required, JsonBody, OkResponse};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use companion_core::domain::{User, UserProfileUpdate};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

#[derive(Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct AddUserRequest {
    pub uid: Option<String>,
    pub email: Option<String>,
}

/// Create the user document right after sign-up.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = AddUserRequest,
    responses(
        (status = 200, body = OkResponse),
        (status = 400, description = "Missing fields")
    )
)]
pub async fn add_user(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<AddUserRequest>,
) -> ApiResult<Json<OkResponse>> {
    let (Some(uid), Some(email)) = (required(req.uid), required(req.email)) else {
        return Err(ApiError::bad_request("Missing fields"));
    };
    state.realtime.add_user(&uid, &email).await?;
    info!("Created user document for {}", uid);
    Ok(Json(OkResponse::ok()))
}

#[utoipa::path(
    get,
    path = "/api/users/{uid}",
    params(("uid" = String, Path, description = "Id of the user")),
    responses(
        (status = 200, body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> ApiResult<Json<User>> {
    state
        .realtime
        .get_user_by_uid(&uid)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Store the basic profile. Resets `status` to `creating` and `firstGreet` to
/// `yet` so that a fresh greeting is generated.
#[utoipa::path(
    put,
    path = "/api/users/{uid}/profile",
    params(("uid" = String, Path, description = "Id of the user")),
    request_body = UserProfileUpdate,
    responses(
        (status = 200, body = OkResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user_profile(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    JsonBody(profile): JsonBody<UserProfileUpdate>,
) -> ApiResult<Json<OkResponse>> {
    state.realtime.update_user_profile(&uid, &profile).await?;
    Ok(Json(OkResponse::ok()))
}
