//! services/api/src/web/tutorial.rs
//!
//! `/api/tutorial`: stores the onboarding answers and kicks off the
//! orchestration jobs that derive initiatives, advice and the news manuscript.

use crate::error::{ApiError, ApiResult};
use crate::web::rest::{required, JsonBody, OkResponse};
use crate::web::state::AppState;
use axum::{extract::State, Json};
use companion_core::domain::ProfileData;
use companion_core::onboarding::career_goals_digest;
use companion_core::ports::PortResult;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct TutorialRequest {
    pub user_id: Option<String>,
    pub profile: Option<ProfileData>,
}

/// Submit the onboarding wizard.
///
/// The memory log, career goals and initiatives are written concurrently.
/// The three orchestration calls run in the background; their failures are
/// logged and never reach the caller.
#[utoipa::path(
    post,
    path = "/api/tutorial",
    request_body = TutorialRequest,
    responses(
        (status = 200, body = OkResponse),
        (status = 400, description = "Missing fields")
    )
)]
pub async fn submit_tutorial(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<TutorialRequest>,
) -> ApiResult<Json<OkResponse>> {
    let (Some(user_id), Some(profile)) = (required(req.user_id), req.profile) else {
        return Err(ApiError::bad_request("Missing fields"));
    };

    let (memory_rows, goals, initiatives) = tokio::try_join!(
        state.db.create_user_profile(&user_id, &profile),
        state.db.create_career_goals(&user_id, &profile.career_goals),
        state.db.create_initiatives(&user_id, &profile.initiatives),
    )?;
    info!(
        "Stored onboarding for {}: {} memory rows, {} goals, {} initiatives",
        user_id,
        memory_rows,
        goals.len(),
        initiatives.len()
    );

    let digest = career_goals_digest(&profile.career_goals);
    let orchestrator = state.orchestrator.clone();
    spawn_job("create-initiatives", user_id.clone(), {
        let orchestrator = orchestrator.clone();
        let user_id = user_id.clone();
        async move { orchestrator.create_initiatives(&user_id, &digest).await }
    });
    spawn_job("advice", user_id.clone(), {
        let orchestrator = orchestrator.clone();
        let user_id = user_id.clone();
        async move { orchestrator.create_advice(&user_id).await }
    });
    spawn_job("manuscript", user_id.clone(), async move {
        orchestrator.create_manuscript(&user_id).await
    });

    Ok(Json(OkResponse::ok()))
}

fn spawn_job<F>(job: &'static str, user_id: String, call: F)
where
    F: Future<Output = PortResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = call.await {
            warn!("Orchestration job {} failed for {}: {}", job, user_id, e);
        }
    });
}
