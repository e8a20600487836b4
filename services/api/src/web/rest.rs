//! services/api/src/web/rest.rs
//!
//! Shared request/response pieces of the REST API and the master definition
//! for the OpenAPI specification.

use crate::error::{ApiError, ApiResult};
use crate::web::{chat, goals, information, routines, session, tasks, tutorial, users};
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use companion_core::domain::{
    Advice, Article, CareerGoal, ChatMessage, ChatRole, FunctionCall, FunctionResponse,
    GreetState, Initiative, MessageStatus, NewCareerGoal, NewInitiative, ProfileData, Quest,
    Routine, RoutineCompletion, User, UserProfileUpdate, UserStatus,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        session::create_session_handler,
        session::remove_session_handler,
        tasks::list_tasks,
        tasks::create_task,
        tasks::update_task,
        tasks::delete_task,
        routines::list_routines,
        routines::create_routine,
        routines::update_routine,
        routines::delete_routine,
        routines::promote_habit,
        goals::list_career_goals,
        goals::create_career_goal,
        goals::delete_career_goal,
        goals::list_initiatives,
        goals::create_initiative,
        goals::delete_initiative,
        information::list_articles,
        information::update_article_favorite,
        information::get_advice,
        information::generate_news,
        tutorial::submit_tutorial,
        users::add_user,
        users::get_user,
        users::update_user_profile,
        chat::send_message,
        chat::list_messages,
    ),
    components(
        schemas(
            OkResponse, ErrorResponse,
            Quest, Routine, RoutineCompletion, CareerGoal, NewCareerGoal, Initiative,
            NewInitiative, Article, Advice, ProfileData, User, UserStatus, GreetState,
            UserProfileUpdate, ChatMessage, ChatRole, MessageStatus, FunctionCall,
            FunctionResponse,
            session::CreateSessionRequest, session::CreateSessionResponse,
            tasks::CreateTaskRequest, tasks::UpdateTaskRequest, tasks::TaskCompletion,
            routines::CreateRoutineRequest, routines::UpdateRoutineRequest,
            routines::PromoteHabitRequest,
            goals::CreateCareerGoalRequest, goals::CreateInitiativeRequest,
            information::FavoriteRequest, information::FavoriteResponse,
            information::NewsRequest,
            tutorial::TutorialRequest,
            users::AddUserRequest,
            chat::SendMessageRequest,
        )
    ),
    tags(
        (name = "Companion API", description = "Quests, routines, career planning and chat sessions of the AI companion.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Payloads
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Body of every 4xx/5xx answer.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Treats an absent or empty field as missing.
pub fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `Json` whose rejection renders as a 400 `{ "error": ... }` body.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

impl UserQuery {
    pub fn require_user(self) -> ApiResult<String> {
        required(self.user_id).ok_or_else(|| ApiError::bad_request("userId is required"))
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdQuery {
    pub id: Option<String>,
}

impl IdQuery {
    pub fn require_id(self) -> ApiResult<String> {
        required(self.id).ok_or_else(|| ApiError::bad_request("id is required"))
    }
}

/// `userId` and `id` for deletes scoped by owner.
#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OwnedQuery {
    pub user_id: Option<String>,
    pub id: Option<String>,
}

impl OwnedQuery {
    pub fn require_both(self) -> ApiResult<(String, String)> {
        match (required(self.user_id), required(self.id)) {
            (Some(user_id), Some(id)) => Ok((user_id, id)),
            _ => Err(ApiError::bad_request("userId and id are required")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_count_as_missing() {
        assert_eq!(required(Some(String::new())), None);
        assert_eq!(required(None), None);
        assert_eq!(required(Some("u1".into())).as_deref(), Some("u1"));
    }

    #[test]
    fn openapi_document_lists_the_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/api/tasks", "/api/habit", "/api/session", "/api/users/{uid}/profile"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn timestamps_are_documented_as_date_time_strings() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        for entity in ["Quest", "Routine", "ChatMessage", "Article"] {
            let created_at = &doc["components"]["schemas"][entity]["properties"]["createdAt"];
            assert_eq!(created_at["type"], "string", "{entity}");
            assert_eq!(created_at["format"], "date-time", "{entity}");
        }
    }
}
