//! services/api/src/web/goals.rs
//!
//! `/api/career-goals` and `/api/initiatives`. Deletes are scoped by the
//! owner, so a mismatched `userId` removes nothing.

use crate::error::{ApiError, ApiResult};
use crate::web::rest::{required, JsonBody, OkResponse, OwnedQuery, UserQuery};
use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use companion_core::domain::{CareerGoal, Initiative, NewCareerGoal, NewInitiative};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateCareerGoalRequest {
    pub user_id: Option<String>,
    pub career_title: Option<String>,
    pub career_body: Option<String>,
    pub target_period: Option<String>,
}

#[derive(Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateInitiativeRequest {
    pub user_id: Option<String>,
    pub title: String,
    pub body: String,
    pub target_period: String,
}

//=========================================================================================
// Career goals
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/career-goals",
    params(UserQuery),
    responses(
        (status = 200, body = [CareerGoal]),
        (status = 400, description = "userId is missing")
    )
)]
pub async fn list_career_goals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<CareerGoal>>> {
    let user_id = query.require_user()?;
    Ok(Json(state.db.get_career_goals(&user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/career-goals",
    request_body = CreateCareerGoalRequest,
    responses(
        (status = 200, description = "The created goal", body = [CareerGoal]),
        (status = 400, description = "Missing fields")
    )
)]
pub async fn create_career_goal(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateCareerGoalRequest>,
) -> ApiResult<Json<Vec<CareerGoal>>> {
    let (Some(user_id), Some(career_title), Some(career_body), Some(target_period)) = (
        required(req.user_id),
        required(req.career_title),
        required(req.career_body),
        required(req.target_period),
    ) else {
        return Err(ApiError::bad_request("Missing fields"));
    };

    let goal = NewCareerGoal {
        career_title,
        career_body,
        target_period,
    };
    Ok(Json(state.db.create_career_goals(&user_id, &[goal]).await?))
}

#[utoipa::path(
    delete,
    path = "/api/career-goals",
    params(OwnedQuery),
    responses(
        (status = 200, body = OkResponse),
        (status = 400, description = "userId and id are required")
    )
)]
pub async fn delete_career_goal(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OwnedQuery>,
) -> ApiResult<Json<OkResponse>> {
    let (user_id, id) = query.require_both()?;
    state.db.delete_career_goal(&user_id, &id).await?;
    Ok(Json(OkResponse::ok()))
}

//=========================================================================================
// Initiatives
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/initiatives",
    params(UserQuery),
    responses(
        (status = 200, body = [Initiative]),
        (status = 400, description = "userId is missing")
    )
)]
pub async fn list_initiatives(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<Initiative>>> {
    let user_id = query.require_user()?;
    Ok(Json(state.db.get_initiatives(&user_id).await?))
}

/// Only `userId` is required; the remaining fields default to empty text.
#[utoipa::path(
    post,
    path = "/api/initiatives",
    request_body = CreateInitiativeRequest,
    responses(
        (status = 200, body = OkResponse),
        (status = 400, description = "userId is missing")
    )
)]
pub async fn create_initiative(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateInitiativeRequest>,
) -> ApiResult<Json<OkResponse>> {
    let user_id = required(req.user_id).ok_or_else(|| ApiError::bad_request("userId is required"))?;
    let initiative = NewInitiative {
        title: req.title,
        body: req.body,
        target_period: req.target_period,
    };
    state.db.create_initiatives(&user_id, &[initiative]).await?;
    Ok(Json(OkResponse::ok()))
}

#[utoipa::path(
    delete,
    path = "/api/initiatives",
    params(OwnedQuery),
    responses(
        (status = 200, body = OkResponse),
        (status = 400, description = "userId and id are required")
    )
)]
pub async fn delete_initiative(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OwnedQuery>,
) -> ApiResult<Json<OkResponse>> {
    let (user_id, id) = query.require_both()?;
    state.db.delete_initiative(&user_id, &id).await?;
    Ok(Json(OkResponse::ok()))
}
