//! services/api/src/web/chat.rs
//!
//! Chat routes of the signed-in session: posting a user turn, reading the
//! history once, and the WebSocket that streams user and history changes.

use crate::error::{ApiError, ApiResult};
use crate::web::middleware::SessionContext;
use crate::web::protocol::{ClientMessage, ServerMessage};
use crate::web::rest::JsonBody;
use crate::web::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Json,
};
use companion_core::domain::{ChatLogEntry, ChatMessage, ChatRole, DEFAULT_AGENT};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

#[derive(Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SendMessageRequest {
    pub content: Option<String>,
    pub agent: Option<String>,
}

/// Writes the user turn to the session and mirrors it into the audit log.
/// The turn is already visible once the session write succeeds, so a failed
/// audit write is logged rather than returned.
async fn post_message(
    state: &AppState,
    session: &SessionContext,
    content: &str,
    agent: Option<&str>,
) -> ApiResult<ChatMessage> {
    let agent = agent.filter(|a| !a.is_empty()).unwrap_or(DEFAULT_AGENT);
    let message = state
        .realtime
        .send_chat_message(&session.user_id, &session.session_id, content, agent)
        .await?;
    if let Err(e) = state
        .db
        .create_chat_message(&ChatLogEntry {
            id: message.id.clone(),
            role: ChatRole::User,
            message: content.to_string(),
        })
        .await
    {
        error!("Chat audit log write failed for message {}: {}", message.id, e);
    }
    Ok(message)
}

/// Append a user message. Resolves once the store acknowledged it; the model's
/// reply is written later by another process.
#[utoipa::path(
    post,
    path = "/api/chat/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 200, body = ChatMessage),
        (status = 400, description = "content is missing"),
        (status = 401, description = "No session"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    session: SessionContext,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> ApiResult<Json<ChatMessage>> {
    let content = req
        .content
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("content is required"))?;
    let message = post_message(&state, &session, &content, req.agent.as_deref()).await?;
    Ok(Json(message))
}

/// The current session's messages, oldest first.
#[utoipa::path(
    get,
    path = "/api/chat/messages",
    responses(
        (status = 200, body = [ChatMessage]),
        (status = 401, description = "No session"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    session: SessionContext,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    state
        .realtime
        .require_session(&session.user_id, &session.session_id)
        .await?;
    let messages = state
        .realtime
        .get_chat_history(&session.user_id, &session.session_id)
        .await?;
    Ok(Json(messages))
}

//=========================================================================================
// WebSocket
//=========================================================================================

/// The handler for upgrading HTTP requests to WebSocket connections.
/// Only sessions created through `POST /api/session` can be streamed.
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    session: SessionContext,
) -> ApiResult<Response> {
    state
        .realtime
        .require_session(&session.user_id, &session.session_id)
        .await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, session)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, session: SessionContext) {
    info!(
        "WebSocket connection established for user {} session {}",
        session.user_id, session.session_id
    );

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // A single writer task owns the sink; subscriptions and the reader only queue.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let user_tx = tx.clone();
    let chat_tx = tx.clone();
    let subscriptions = state
        .realtime
        .get_user_snapshot(&session.user_id, move |user| {
            let _ = user_tx.send(ServerMessage::User { user });
        })
        .and_then(|user_sub| {
            state
                .realtime
                .get_chat_history_snapshot(&session.user_id, &session.session_id, move |messages| {
                    let _ = chat_tx.send(ServerMessage::ChatHistory { messages });
                })
                .map(|chat_sub| (user_sub, chat_sub))
        });
    let subscriptions = match subscriptions {
        Ok(subs) => subs,
        Err(e) => {
            error!("Failed to subscribe: {:?}", e);
            let _ = tx.send(ServerMessage::Error {
                message: "Failed to load session data.".to_string(),
            });
            drop(tx);
            let _ = writer.await;
            return;
        }
    };

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::SendMessage { content, agent }) => {
                    if content.is_empty() {
                        continue;
                    }
                    if let Err(e) = post_message(&state, &session, &content, agent.as_deref()).await {
                        error!("Failed to send chat message: {:?}", e);
                        let _ = tx.send(ServerMessage::Error {
                            message: "Failed to send message.".to_string(),
                        });
                    }
                }
                Err(e) => warn!("Failed to deserialize client message: {}", e),
            },
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- Cleanup ---
    let (user_sub, chat_sub) = subscriptions;
    user_sub.cancel();
    chat_sub.cancel();
    writer.abort();
    info!("WebSocket connection closed.");
}
