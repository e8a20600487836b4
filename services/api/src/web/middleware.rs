//! services/api/src/web/middleware.rs
//!
//! Session middleware for resolving and protecting routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::sync::Arc;

use crate::error::ApiError;
use crate::web::session::{SESSION_ID_COOKIE, USER_COOKIE};
use crate::web::state::AppState;

/// The verified identity behind a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub session_id: String,
}

/// Middleware that verifies the session cookies.
///
/// If both are present and correctly signed, inserts a `SessionContext` into the
/// request extensions. Requests without one pass through untouched.
pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let headers = req.headers();
    let context = state
        .cookies
        .read(headers, USER_COOKIE)
        .zip(state.cookies.read(headers, SESSION_ID_COOKIE))
        .map(|(user_id, session_id)| SessionContext {
            user_id,
            session_id,
        });

    if let Some(context) = context {
        req.extensions_mut().insert(context);
    }
    next.run(req).await
}

/// Middleware that rejects requests `resolve_session` could not attach a session to.
pub async fn require_session(req: Request, next: Next) -> Result<Response, ApiError> {
    if req.extensions().get::<SessionContext>().is_none() {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

/// Extracts the session when there is one.
pub struct MaybeSession(pub Option<SessionContext>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<SessionContext>().cloned()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}
