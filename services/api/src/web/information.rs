//! services/api/src/web/information.rs
//!
//! Curated articles, the latest advice and the news audio proxy.

use crate::error::{ApiError, ApiResult};
use crate::web::rest::{required, JsonBody, UserQuery};
use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use companion_core::domain::{Advice, Article};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

const NEWS_FAILED: &str = "ニュース生成中にエラーが発生しました";

#[derive(Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct FavoriteRequest {
    pub id: Option<String>,
    pub favorite: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct FavoriteResponse {
    pub favorite: bool,
}

#[derive(Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct NewsRequest {
    pub user_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/information",
    params(UserQuery),
    responses(
        (status = 200, body = [Article]),
        (status = 400, description = "userId is missing")
    )
)]
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<Article>>> {
    let user_id = query.require_user()?;
    Ok(Json(state.db.get_articles(&user_id).await?))
}

/// Sets the favorite flag of one of the user's articles.
#[utoipa::path(
    put,
    path = "/api/information",
    params(UserQuery),
    request_body = FavoriteRequest,
    responses(
        (status = 200, body = FavoriteResponse),
        (status = 400, description = "userId or id is missing"),
        (status = 404, description = "The user has no such article")
    )
)]
pub async fn update_article_favorite(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
    JsonBody(req): JsonBody<FavoriteRequest>,
) -> ApiResult<Json<FavoriteResponse>> {
    let user_id = query.require_user()?;
    let id = required(req.id).ok_or_else(|| ApiError::bad_request("id is required"))?;
    let favorite = req
        .favorite
        .ok_or_else(|| ApiError::bad_request("Missing fields"))?;
    let favorite = state
        .db
        .update_article_favorite(&user_id, &id, favorite)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;
    Ok(Json(FavoriteResponse { favorite }))
}

/// The latest advice, or `null` while none has been generated.
#[utoipa::path(
    get,
    path = "/api/advice",
    params(UserQuery),
    responses(
        (status = 200, description = "The advice, or null", body = Advice),
        (status = 400, description = "userId is missing")
    )
)]
pub async fn get_advice(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Option<Advice>>> {
    let user_id = query.require_user()?;
    Ok(Json(state.db.get_advice(&user_id).await?))
}

/// Asks the orchestration service for today's news audio and relays its reply.
#[utoipa::path(
    post,
    path = "/api/news",
    request_body = NewsRequest,
    responses(
        (status = 200, description = "Reply of the orchestration service, including the audio URL"),
        (status = 400, description = "user_id is missing"),
        (status = 500, description = "The orchestration service failed")
    )
)]
pub async fn generate_news(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<NewsRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = required(req.user_id).ok_or_else(|| ApiError::bad_request("user_id is required"))?;
    match state.orchestrator.generate_news(&user_id).await {
        Ok(reply) => Ok(Json(reply)),
        Err(e) => {
            error!("News generation failed for {}: {}", user_id, e);
            Err(ApiError::Upstream(NEWS_FAILED.to_string()))
        }
    }
}
