//! services/api/src/web/tasks.rs
//!
//! `/api/tasks`: CRUD over the user's quests.

use crate::error::{ApiError, ApiResult};
use crate::web::middleware::MaybeSession;
use crate::web::rest::{required, IdQuery, JsonBody, OkResponse, UserQuery};
use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use companion_core::domain::{is_known_category, NewQuest, Quest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateTaskRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub estimated_time: Option<String>,
}

#[derive(Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateTaskRequest {
    pub completed: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct TaskCompletion {
    pub completed: bool,
}

/// All quests of the user, newest first. Narrowing to "today" is up to the caller.
#[utoipa::path(
    get,
    path = "/api/tasks",
    params(UserQuery),
    responses(
        (status = 200, body = [Quest]),
        (status = 400, description = "userId is missing")
    )
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<Quest>>> {
    let user_id = query.require_user()?;
    Ok(Json(state.db.get_daily_tasks(&user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 200, body = Quest),
        (status = 400, description = "Missing fields or unknown category")
    )
)]
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateTaskRequest>,
) -> ApiResult<Json<Quest>> {
    let (Some(user_id), Some(title), Some(category), Some(estimated_time)) = (
        required(req.user_id),
        required(req.title),
        required(req.category),
        required(req.estimated_time),
    ) else {
        return Err(ApiError::bad_request("Missing fields"));
    };
    if !is_known_category(&category) {
        return Err(ApiError::bad_request(format!("Unknown category: {}", category)));
    }

    let quest = state
        .db
        .create_task(NewQuest {
            user_id,
            title,
            description: req.description.unwrap_or_default(),
            category,
            estimated_time,
        })
        .await?;
    Ok(Json(quest))
}

/// Checks that the signed-in user owns the task. Without a session the caller is trusted.
async fn check_owner(state: &AppState, session: &MaybeSession, id: &str) -> ApiResult<()> {
    let Some(context) = &session.0 else {
        return Ok(());
    };
    match state.db.get_task(id).await? {
        Some(quest) if quest.user_id == context.user_id => Ok(()),
        _ => Err(ApiError::not_found("Task not found")),
    }
}

#[utoipa::path(
    put,
    path = "/api/tasks",
    params(IdQuery),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, body = TaskCompletion),
        (status = 400, description = "id or completed is missing"),
        (status = 404, description = "No such task")
    )
)]
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Query(query): Query<IdQuery>,
    JsonBody(req): JsonBody<UpdateTaskRequest>,
) -> ApiResult<Json<TaskCompletion>> {
    let id = query.require_id()?;
    let completed = req
        .completed
        .ok_or_else(|| ApiError::bad_request("Missing fields"))?;
    check_owner(&state, &session, &id).await?;
    let completed = state
        .db
        .update_task_completion(&id, completed)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    Ok(Json(TaskCompletion { completed }))
}

/// Hard delete.
#[utoipa::path(
    delete,
    path = "/api/tasks",
    params(IdQuery),
    responses(
        (status = 200, body = OkResponse),
        (status = 400, description = "id is missing")
    )
)]
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<OkResponse>> {
    let id = query.require_id()?;
    check_owner(&state, &session, &id).await?;
    state.db.delete_task(&id).await?;
    Ok(Json(OkResponse::ok()))
}
