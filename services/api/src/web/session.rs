//! services/api/src/web/session.rs
//!
//! Cookie-backed sessions: signing and parsing of the `user_session` and
//! `session_id` cookies, and the endpoints that create and remove a session.

use crate::error::{ApiError, ApiResult};
use crate::web::rest::{required, JsonBody};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect},
    Json,
};
use companion_core::client_state::SIGN_IN_ROUTE;
use companion_core::domain::new_id;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

pub const USER_COOKIE: &str = "user_session";
pub const SESSION_ID_COOKIE: &str = "session_id";
/// One hour.
pub const SESSION_MAX_AGE_SECS: i64 = 60 * 60;

//=========================================================================================
// Cookie Signing
//=========================================================================================

/// Issues and verifies `value.signature` cookies.
#[derive(Clone)]
pub struct SessionCookies {
    mac: HmacSha256,
    secure: bool,
}

impl SessionCookies {
    pub fn new(secret: &[u8], secure: bool) -> Result<Self, ApiError> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| ApiError::Internal(format!("cookie key: {}", e)))?;
        Ok(Self { mac, secure })
    }

    fn signature(&self, name: &str, value: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(name.as_bytes());
        mac.update(b"=");
        mac.update(value.as_bytes());
        mac
    }

    pub fn sign(&self, name: &str, value: &str) -> String {
        let tag = self.signature(name, value).finalize().into_bytes();
        format!("{}.{}", value, hex::encode(tag))
    }

    /// Returns the value when the signature matches, `None` for anything else.
    pub fn verify(&self, name: &str, signed: &str) -> Option<String> {
        let (value, tag) = signed.rsplit_once('.')?;
        let tag = hex::decode(tag).ok()?;
        self.signature(name, value).verify_slice(&tag).ok()?;
        Some(value.to_string())
    }

    /// Reads and verifies the named cookie from the request headers.
    pub fn read(&self, headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(key, _)| *key == name)
            .find_map(|(_, raw)| self.verify(name, raw))
    }

    /// A `Set-Cookie` value for a fresh one-hour cookie.
    pub fn issue(&self, name: &str, value: &str) -> String {
        self.render(name, &self.sign(name, value), SESSION_MAX_AGE_SECS)
    }

    /// A `Set-Cookie` value that makes the browser drop the cookie.
    pub fn expire(&self, name: &str) -> String {
        self.render(name, "", 0)
    }

    fn render(&self, name: &str, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            name, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    /// `true` when this call created the session document.
    pub created: bool,
}

/// Start (or resume) the chat session of the signed-in user.
///
/// Reuses the `session_id` cookie when present, otherwise mints a new id.
/// The session document and its placeholder greeting are written at most once.
#[utoipa::path(
    post,
    path = "/api/session",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session cookies set", body = CreateSessionResponse),
        (status = 400, description = "userId is missing")
    )
)]
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    JsonBody(req): JsonBody<CreateSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = required(req.user_id).ok_or_else(|| ApiError::bad_request("userId is required"))?;

    let cookies = &state.cookies;
    let mut set_cookies = vec![(header::SET_COOKIE, cookies.issue(USER_COOKIE, &user_id))];
    let session_id = match cookies.read(&headers, SESSION_ID_COOKIE) {
        Some(existing) => existing,
        None => {
            let minted = new_id();
            set_cookies.push((header::SET_COOKIE, cookies.issue(SESSION_ID_COOKIE, &minted)));
            minted
        }
    };

    let created = state.realtime.send_session(&user_id, &session_id).await?;
    if created {
        info!("Created session {} for user {}", session_id, user_id);
    }

    Ok((
        AppendHeaders(set_cookies),
        Json(CreateSessionResponse {
            session_id,
            created,
        }),
    ))
}

/// Sign out: drops the identity cookie and sends the browser to the sign-in page.
/// The session document and its history are kept.
#[utoipa::path(
    delete,
    path = "/api/session",
    responses((status = 303, description = "Redirect to the sign-in page"))
)]
pub async fn remove_session_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, state.cookies.expire(USER_COOKIE))]),
        Redirect::to(SIGN_IN_ROUTE),
    )
}
