pub mod chat;
pub mod goals;
pub mod information;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod routines;
pub mod session;
pub mod state;
pub mod tasks;
pub mod tutorial;
pub mod users;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use middleware::{require_session, resolve_session};
use state::AppState;

/// Builds every `/api` route over the shared state. Cross-cutting layers
/// (CORS, tracing, Swagger UI) are added by the binary.
pub fn build_router(state: Arc<AppState>) -> Router {
    let chat_routes = Router::new()
        .route(
            "/api/chat/messages",
            get(chat::list_messages).post(chat::send_message),
        )
        .route("/api/chat/ws", get(chat::chat_ws))
        .layer(axum_middleware::from_fn(require_session));

    Router::new()
        .route(
            "/api/session",
            post(session::create_session_handler).delete(session::remove_session_handler),
        )
        .route(
            "/api/tasks",
            get(tasks::list_tasks)
                .post(tasks::create_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route(
            "/api/routines",
            get(routines::list_routines)
                .post(routines::create_routine)
                .put(routines::update_routine)
                .delete(routines::delete_routine),
        )
        .route("/api/habit", post(routines::promote_habit))
        .route(
            "/api/career-goals",
            get(goals::list_career_goals)
                .post(goals::create_career_goal)
                .delete(goals::delete_career_goal),
        )
        .route(
            "/api/initiatives",
            get(goals::list_initiatives)
                .post(goals::create_initiative)
                .delete(goals::delete_initiative),
        )
        .route(
            "/api/information",
            get(information::list_articles).put(information::update_article_favorite),
        )
        .route("/api/advice", get(information::get_advice))
        .route("/api/news", post(information::generate_news))
        .route("/api/tutorial", post(tutorial::submit_tutorial))
        .route("/api/users", post(users::add_user))
        .route("/api/users/{uid}", get(users::get_user))
        .route("/api/users/{uid}/profile", put(users::update_user_profile))
        .merge(chat_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            resolve_session,
        ))
        .with_state(state)
}
