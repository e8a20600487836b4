//! services/api/src/realtime.rs
//!
//! Typed access to the realtime document store: user profile/status documents,
//! chat sessions and their ordered messages, plus live subscriptions that push
//! every change to a handler until cancelled.

use chrono::FixedOffset;
use companion_core::docpath::{messages_collection, parent_of, session_doc, user_doc};
use companion_core::domain::{
    ChatMessage, GreetState, User, UserProfileUpdate, UserStatus, DEFAULT_AGENT,
};
use companion_core::ports::{Change, DocumentSnapshot, DocumentStore, PortError, PortResult};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Decodes a snapshot, taking `id` and `createdAt` from the store rather than the payload.
fn decode<T: DeserializeOwned>(snapshot: DocumentSnapshot, offset: FixedOffset) -> PortResult<T> {
    let mut data = snapshot.data;
    data.insert("id".into(), Value::String(snapshot.id));
    data.insert(
        "createdAt".into(),
        Value::String(snapshot.create_time.with_timezone(&offset).to_rfc3339()),
    );
    serde_json::from_value(Value::Object(data))
        .map_err(|e| PortError::Unexpected(format!("{}: {}", snapshot.path, e)))
}

//=========================================================================================
// Gateway
//=========================================================================================

#[derive(Clone)]
pub struct RealtimeGateway {
    docs: Arc<dyn DocumentStore>,
    offset: FixedOffset,
}

impl RealtimeGateway {
    pub fn new(docs: Arc<dyn DocumentStore>, offset: FixedOffset) -> Self {
        Self { docs, offset }
    }

    /// Creates the user document right after sign-up.
    pub async fn add_user(&self, uid: &str, email: &str) -> PortResult<()> {
        self.docs
            .set(
                &user_doc(uid)?,
                fields(json!({
                    "email": email,
                    "status": UserStatus::Creating,
                    "firstGreet": GreetState::Yet,
                })),
            )
            .await
    }

    pub async fn get_user_by_uid(&self, uid: &str) -> PortResult<Option<User>> {
        match self.docs.get(&user_doc(uid)?).await? {
            Some(snapshot) => Ok(Some(decode(snapshot, self.offset)?)),
            None => Ok(None),
        }
    }

    /// Writes the basic profile and asks downstream processes for a fresh greeting.
    pub async fn update_user_profile(&self, uid: &str, profile: &UserProfileUpdate) -> PortResult<()> {
        self.docs
            .merge(
                &user_doc(uid)?,
                fields(json!({
                    "nickname": profile.nickname,
                    "gender": profile.gender,
                    "age": profile.age,
                    "location": profile.location,
                    "iotDeviceUrl": profile.iot_device_url,
                    "status": UserStatus::Creating,
                    "firstGreet": GreetState::Yet,
                })),
            )
            .await
    }

    /// Creates the session document if it does not exist yet and, only in that
    /// case, seeds the "thinking" placeholder the greeting will overwrite.
    /// Returns `true` when this call created the session.
    pub async fn send_session(&self, uid: &str, session_id: &str) -> PortResult<bool> {
        let created = self
            .docs
            .create_if_absent(
                &session_doc(uid, session_id)?,
                fields(json!({ "id": session_id, "sessionFirstGreet": GreetState::Yet })),
            )
            .await?;
        if !created {
            info!("Session {} already exists for user {}", session_id, uid);
            return Ok(false);
        }

        self.docs
            .add(
                &messages_collection(uid, session_id)?,
                fields(json!({
                    "content": "",
                    "loading": true,
                    "role": "model",
                    "status": "thinking",
                    "processing": false,
                    "agent": DEFAULT_AGENT,
                })),
            )
            .await?;
        Ok(true)
    }

    /// Appends one user turn. Resolves once the store acknowledged the write.
    /// Fails with `NotFound` when the session was never created.
    pub async fn send_chat_message(
        &self,
        uid: &str,
        session_id: &str,
        content: &str,
        agent: &str,
    ) -> PortResult<ChatMessage> {
        self.require_session(uid, session_id).await?;
        let snapshot = self
            .docs
            .add(
                &messages_collection(uid, session_id)?,
                fields(json!({
                    "content": content,
                    "role": "user",
                    "loading": false,
                    "status": "success",
                    "processing": false,
                    "agent": agent,
                })),
            )
            .await?;
        decode(snapshot, self.offset)
    }

    pub async fn session_exists(&self, uid: &str, session_id: &str) -> PortResult<bool> {
        Ok(self.docs.get(&session_doc(uid, session_id)?).await?.is_some())
    }

    pub async fn require_session(&self, uid: &str, session_id: &str) -> PortResult<()> {
        if self.session_exists(uid, session_id).await? {
            Ok(())
        } else {
            Err(PortError::NotFound("Session not found".to_string()))
        }
    }

    /// The session's messages, oldest first. Undecodable entries are skipped.
    pub async fn get_chat_history(&self, uid: &str, session_id: &str) -> PortResult<Vec<ChatMessage>> {
        let snapshots = self.docs.list(&messages_collection(uid, session_id)?).await?;
        Ok(snapshots
            .into_iter()
            .filter_map(|snapshot| match decode::<ChatMessage>(snapshot, self.offset) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Skipping malformed chat message: {}", e);
                    None
                }
            })
            .collect())
    }

    /// Pushes the user document on subscribe and after every write to it.
    pub fn get_user_snapshot<F>(&self, uid: &str, mut handler: F) -> PortResult<Subscription>
    where
        F: FnMut(User) + Send + 'static,
    {
        let path = user_doc(uid)?;
        let gateway = self.clone();
        let uid = uid.to_string();
        Ok(self.subscribe(
            move |change| match change {
                Change::Path(p) => *p == path,
                Change::Resync => true,
            },
            move || {
                let gateway = gateway.clone();
                let uid = uid.clone();
                async move { gateway.get_user_by_uid(&uid).await }
            },
            move |user: Option<User>| {
                if let Some(user) = user {
                    handler(user);
                }
            },
        ))
    }

    /// Pushes the full ordered message list on subscribe and after every change.
    pub fn get_chat_history_snapshot<F>(
        &self,
        uid: &str,
        session_id: &str,
        handler: F,
    ) -> PortResult<Subscription>
    where
        F: FnMut(Vec<ChatMessage>) + Send + 'static,
    {
        let collection = messages_collection(uid, session_id)?;
        let gateway = self.clone();
        let uid = uid.to_string();
        let session_id = session_id.to_string();
        Ok(self.subscribe(
            move |change| match change {
                Change::Path(p) => parent_of(p) == collection,
                Change::Resync => true,
            },
            move || {
                let gateway = gateway.clone();
                let uid = uid.clone();
                let session_id = session_id.clone();
                async move { gateway.get_chat_history(&uid, &session_id).await }
            },
            handler,
        ))
    }

    fn subscribe<T, M, L, Fut, H>(&self, matches: M, load: L, mut handler: H) -> Subscription
    where
        T: Send + 'static,
        M: Fn(&Change) -> bool + Send + 'static,
        L: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = PortResult<T>> + Send + 'static,
        H: FnMut(T) + Send + 'static,
    {
        let subscription = Subscription::new();
        let token = subscription.token.clone();
        let gate = subscription.gate.clone();
        let docs = self.docs.clone();

        tokio::spawn(async move {
            // The feed is opened before the first read so no write can slip between them.
            let mut feed = match docs.changes().await {
                Ok(feed) => feed,
                Err(e) => {
                    error!("Failed to open document change feed: {:?}", e);
                    return;
                }
            };

            match load().await {
                Ok(value) => {
                    if !deliver(&gate, &mut handler, value) {
                        return;
                    }
                }
                Err(e) => warn!("Initial snapshot read failed: {:?}", e),
            }

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    change = feed.next() => match change {
                        Some(change) if matches(&change) => match load().await {
                            Ok(value) => {
                                if !deliver(&gate, &mut handler, value) {
                                    break;
                                }
                            }
                            Err(e) => warn!("Snapshot re-read failed: {:?}", e),
                        },
                        Some(_) => {}
                        None => {
                            warn!("Document change feed closed; subscription ends.");
                            break;
                        }
                    }
                }
            }
        });

        subscription
    }
}

/// Invokes the handler unless the subscription was cancelled.
/// Holding the gate during the call is what makes `cancel` wait for it.
fn deliver<T, H: FnMut(T)>(gate: &Mutex<bool>, handler: &mut H, value: T) -> bool {
    let open = gate.lock().unwrap_or_else(|e| e.into_inner());
    if !*open {
        return false;
    }
    handler(value);
    true
}

//=========================================================================================
// Subscription
//=========================================================================================

/// Handle to a live subscription. Once `cancel` returns (or the handle is
/// dropped) the handler is not running and will not be invoked again.
/// A handler must not cancel its own subscription.
pub struct Subscription {
    token: CancellationToken,
    gate: Arc<Mutex<bool>>,
}

impl Subscription {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            gate: Arc::new(Mutex::new(true)),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
        *self.gate.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryDocumentStore;
    use companion_core::calendar::{home_offset, SystemClock};
    use companion_core::domain::{ChatRole, MessageStatus};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn gateway() -> (Arc<MemoryDocumentStore>, RealtimeGateway) {
        let docs = Arc::new(MemoryDocumentStore::new(Arc::new(SystemClock)));
        let gateway = RealtimeGateway::new(docs.clone(), home_offset(9).unwrap());
        (docs, gateway)
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no snapshot within 2s")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn send_session_is_idempotent() {
        let (_docs, gw) = gateway();
        assert!(gw.send_session("u1", "s1").await.unwrap());
        assert!(!gw.send_session("u1", "s1").await.unwrap());

        let history = gw.get_chat_history("u1", "s1").await.unwrap();
        assert_eq!(history.len(), 1);
        let placeholder = &history[0];
        assert_eq!(placeholder.role, ChatRole::Model);
        assert_eq!(placeholder.status, MessageStatus::Thinking);
        assert!(placeholder.loading);
        assert_eq!(placeholder.agent, DEFAULT_AGENT);
    }

    #[tokio::test]
    async fn concurrent_session_creation_inserts_one_placeholder() {
        let (_docs, gw) = gateway();
        let (a, b) = tokio::join!(gw.send_session("u1", "s1"), gw.send_session("u1", "s1"));
        assert!(a.unwrap() ^ b.unwrap());
        assert_eq!(gw.get_chat_history("u1", "s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn chat_history_snapshot_is_ordered_under_concurrent_writers() {
        let (_docs, gw) = gateway();
        gw.send_session("u1", "s1").await.unwrap();

        let writers: Vec<_> = (0..10)
            .map(|n| {
                let gw = gw.clone();
                tokio::spawn(async move {
                    gw.send_chat_message("u1", "s1", &format!("msg {n}"), "Misaki")
                        .await
                        .unwrap()
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = gw
            .get_chat_history_snapshot("u1", "s1", move |messages| {
                let _ = tx.send(messages);
            })
            .unwrap();
        let messages = next(&mut rx).await;
        assert_eq!(messages.len(), 11);
        assert!(messages
            .windows(2)
            .all(|w| w[0].created_at < w[1].created_at));
    }

    #[tokio::test]
    async fn user_snapshot_sees_external_status_changes() {
        let (docs, gw) = gateway();
        gw.add_user("u1", "u1@example.com").await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = gw
            .get_user_snapshot("u1", move |user| {
                let _ = tx.send(user.status);
            })
            .unwrap();
        assert_eq!(next(&mut rx).await, UserStatus::Creating);

        // Another process finishes the first greeting.
        docs.merge("users/u1", fields(json!({ "status": "created" })))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, UserStatus::Created);
    }

    #[tokio::test]
    async fn cancelled_subscription_stops_delivering() {
        let (_docs, gw) = gateway();
        gw.send_session("u1", "s1").await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = gw
            .get_chat_history_snapshot("u1", "s1", move |messages| {
                let _ = tx.send(messages.len());
            })
            .unwrap();
        assert_eq!(next(&mut rx).await, 1);

        sub.cancel();
        gw.send_chat_message("u1", "s1", "hello", "Misaki").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn messages_need_an_existing_session() {
        let (docs, gw) = gateway();
        let result = gw.send_chat_message("u1", "ghost", "hi", "Misaki").await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
        assert!(docs
            .list("users/u1/sessions/ghost/messages")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn profile_update_resets_greeting_state() {
        let (_docs, gw) = gateway();
        gw.add_user("u1", "u1@example.com").await.unwrap();
        gw.update_user_profile(
            "u1",
            &UserProfileUpdate {
                nickname: "たろう".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let user = gw.get_user_by_uid("u1").await.unwrap().unwrap();
        assert_eq!(user.nickname.as_deref(), Some("たろう"));
        assert_eq!(user.status, UserStatus::Creating);
        assert_eq!(user.first_greet, Some(GreetState::Yet));
    }
}
