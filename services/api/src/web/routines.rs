//! services/api/src/web/routines.rs
//!
//! `/api/routines` CRUD and `/api/habit`, which turns a quest into a routine.

use crate::error::{ApiError, ApiResult};
use crate::web::rest::{required, IdQuery, JsonBody, OkResponse, UserQuery};
use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use companion_core::domain::{
    is_known_category, NewRoutine, Routine, RoutineCompletion, DEFAULT_ROUTINE_FREQUENCY,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

#[derive(Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRoutineRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<String>,
    pub time: Option<String>,
    pub category: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoutineRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

#[derive(Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PromoteHabitRequest {
    /// Id of the quest to promote.
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub frequency: Option<String>,
    pub time: Option<String>,
}

/// Routines created today (home timezone) that are not deleted.
#[utoipa::path(
    get,
    path = "/api/routines",
    params(UserQuery),
    responses(
        (status = 200, body = [Routine]),
        (status = 400, description = "userId is missing")
    )
)]
pub async fn list_routines(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<Routine>>> {
    let user_id = query.require_user()?;
    Ok(Json(state.db.get_todays_routines(&user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/routines",
    request_body = CreateRoutineRequest,
    responses(
        (status = 200, body = Routine),
        (status = 400, description = "Missing fields or unknown category")
    )
)]
pub async fn create_routine(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateRoutineRequest>,
) -> ApiResult<Json<Routine>> {
    let (Some(user_id), Some(title), Some(frequency), Some(category)) = (
        required(req.user_id),
        required(req.title),
        required(req.frequency),
        required(req.category),
    ) else {
        return Err(ApiError::bad_request("Missing fields"));
    };
    if !is_known_category(&category) {
        return Err(ApiError::bad_request(format!("Unknown category: {}", category)));
    }

    let routine = state
        .db
        .create_routine(NewRoutine {
            user_id,
            title,
            description: req.description.unwrap_or_default(),
            frequency,
            time: req.time.unwrap_or_default(),
            category,
        })
        .await?;
    Ok(Json(routine))
}

/// Toggles completion; the streak follows each false/true flip.
#[utoipa::path(
    put,
    path = "/api/routines",
    params(IdQuery),
    request_body = UpdateRoutineRequest,
    responses(
        (status = 200, body = RoutineCompletion),
        (status = 400, description = "id, userId or completed is missing"),
        (status = 404, description = "Routine not found")
    )
)]
pub async fn update_routine(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    JsonBody(req): JsonBody<UpdateRoutineRequest>,
) -> ApiResult<Json<RoutineCompletion>> {
    let id = query.require_id()?;
    let user_id = required(req.user_id).ok_or_else(|| ApiError::bad_request("userId is required"))?;
    let completed = req
        .completed
        .ok_or_else(|| ApiError::bad_request("Missing fields"))?;
    let completion = state
        .db
        .update_routine_completion(&user_id, &id, completed)
        .await?
        .ok_or_else(|| ApiError::not_found("Routine not found"))?;
    Ok(Json(completion))
}

/// Soft delete; the row stays for streak history.
#[utoipa::path(
    delete,
    path = "/api/routines",
    params(IdQuery),
    responses(
        (status = 200, body = OkResponse),
        (status = 400, description = "id is missing")
    )
)]
pub async fn delete_routine(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<OkResponse>> {
    let id = query.require_id()?;
    state.db.delete_routine(&id).await?;
    Ok(Json(OkResponse::ok()))
}

/// Promote a quest to a routine.
///
/// Three separate writes: read the quest, insert the routine, delete the quest.
/// They are not atomic; if the delete fails the routine and the quest both remain.
#[utoipa::path(
    post,
    path = "/api/habit",
    request_body = PromoteHabitRequest,
    responses(
        (status = 200, body = Routine),
        (status = 400, description = "id and userId are required"),
        (status = 404, description = "Quest not found")
    )
)]
pub async fn promote_habit(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<PromoteHabitRequest>,
) -> ApiResult<Json<Routine>> {
    let (Some(id), Some(user_id)) = (required(req.id), required(req.user_id)) else {
        return Err(ApiError::bad_request("id and userId are required"));
    };

    let quest = state
        .db
        .get_daily_tasks(&user_id)
        .await?
        .into_iter()
        .find(|quest| quest.id == id)
        .ok_or_else(|| ApiError::not_found("Quest not found"))?;

    let routine = state
        .db
        .create_routine(NewRoutine {
            user_id,
            title: quest.title,
            description: quest.description,
            frequency: required(req.frequency)
                .unwrap_or_else(|| DEFAULT_ROUTINE_FREQUENCY.to_string()),
            time: req.time.unwrap_or_default(),
            category: quest.category,
        })
        .await?;

    state.db.delete_task(&id).await?;
    info!("Promoted quest {} to routine {}", id, routine.id);
    Ok(Json(routine))
}
