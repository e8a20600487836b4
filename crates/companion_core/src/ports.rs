//! crates/companion_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the route layer
//! only ever talks to a relational store, a realtime document store and the
//! external orchestration service through them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::{Map, Value};
use std::pin::Pin;

use crate::domain::{
    Advice, Article, CareerGoal, ChatLogEntry, Initiative, NewCareerGoal, NewInitiative,
    NewQuest, NewRoutine, ProfileData, Quest, Routine, RoutineCompletion,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Upstream service failed: {0}")]
    Upstream(String),
    #[error("Failed to save chat message: {0}")]
    ChatLog(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Relational Store
//=========================================================================================

/// Durable, queryable business entities. Every read is parameterized by the
/// caller's user id; writes assign ids and timestamps server-side.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    // --- Quests ---
    /// All quests of the user, newest first. No date filtering.
    async fn get_daily_tasks(&self, user_id: &str) -> PortResult<Vec<Quest>>;

    async fn get_task(&self, id: &str) -> PortResult<Option<Quest>>;

    async fn create_task(&self, input: NewQuest) -> PortResult<Quest>;

    /// Unscoped update by primary key. `None` when no row matched.
    async fn update_task_completion(&self, id: &str, completed: bool) -> PortResult<Option<bool>>;

    /// Hard delete. Returns the number of removed rows.
    async fn delete_task(&self, id: &str) -> PortResult<u64>;

    // --- Onboarding memory log ---
    /// Appends one `initialize` memory row per non-empty profile field and
    /// returns how many rows were written.
    async fn create_user_profile(&self, user_id: &str, profile: &ProfileData) -> PortResult<usize>;

    // --- Career goals ---
    async fn create_career_goals(
        &self,
        user_id: &str,
        goals: &[NewCareerGoal],
    ) -> PortResult<Vec<CareerGoal>>;

    async fn get_career_goals(&self, user_id: &str) -> PortResult<Vec<CareerGoal>>;

    async fn delete_career_goal(&self, user_id: &str, id: &str) -> PortResult<u64>;

    // --- Initiatives ---
    async fn create_initiatives(
        &self,
        user_id: &str,
        initiatives: &[NewInitiative],
    ) -> PortResult<Vec<Initiative>>;

    async fn get_initiatives(&self, user_id: &str) -> PortResult<Vec<Initiative>>;

    async fn delete_initiative(&self, user_id: &str, id: &str) -> PortResult<u64>;

    // --- Articles ---
    async fn get_articles(&self, user_id: &str) -> PortResult<Vec<Article>>;

    async fn update_article_favorite(
        &self,
        user_id: &str,
        id: &str,
        favorite: bool,
    ) -> PortResult<Option<bool>>;

    // --- Routines ---
    /// Non-deleted routines created since the start of today in the home timezone.
    async fn get_todays_routines(&self, user_id: &str) -> PortResult<Vec<Routine>>;

    async fn create_routine(&self, input: NewRoutine) -> PortResult<Routine>;

    async fn update_routine_completion(
        &self,
        user_id: &str,
        id: &str,
        completed: bool,
    ) -> PortResult<Option<RoutineCompletion>>;

    /// Soft delete (`deleted = true`).
    async fn delete_routine(&self, id: &str) -> PortResult<u64>;

    // --- Advice ---
    /// The latest non-deleted advice, or `None` when there is none yet.
    async fn get_advice(&self, user_id: &str) -> PortResult<Option<Advice>>;

    // --- Chat audit log ---
    /// Fails with [`PortError::ChatLog`].
    async fn create_chat_message(&self, entry: &ChatLogEntry) -> PortResult<()>;
}

//=========================================================================================
// Realtime Document Store
//=========================================================================================

/// A stored document as read back from the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub path: String,
    pub data: Map<String, Value>,
    /// Server-assigned creation time.
    pub create_time: DateTime<Utc>,
}

/// One entry of the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The document at this path was created or modified.
    Path(String),
    /// Notifications may have been lost; every subscriber should re-read.
    Resync,
}

pub type ChangeStream = Pin<Box<dyn Stream<Item = Change> + Send>>;

/// Path-addressed JSON documents with a push-based change feed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> PortResult<Option<DocumentSnapshot>>;

    /// Creates or replaces the document.
    async fn set(&self, path: &str, data: Map<String, Value>) -> PortResult<()>;

    /// Overwrites the given top-level fields. Fails with `NotFound` if absent.
    async fn merge(&self, path: &str, data: Map<String, Value>) -> PortResult<()>;

    /// Writes the document only if nothing exists at `path`.
    /// Returns `true` when this call created it.
    async fn create_if_absent(&self, path: &str, data: Map<String, Value>) -> PortResult<bool>;

    /// Adds a document with a generated id under `collection`. Creation times
    /// are strictly increasing within a collection.
    async fn add(&self, collection: &str, data: Map<String, Value>) -> PortResult<DocumentSnapshot>;

    /// Direct children of `collection`, ascending by creation time.
    async fn list(&self, collection: &str) -> PortResult<Vec<DocumentSnapshot>>;

    /// Opens a feed of every subsequent write, from any process.
    async fn changes(&self) -> PortResult<ChangeStream>;
}

//=========================================================================================
// External Orchestration Service
//=========================================================================================

#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Builds the news audio for the user; the reply carries a signed URL.
    async fn generate_news(&self, user_id: &str) -> PortResult<Value>;

    /// `career_goals` is one `"{title}: {body}"` line per goal.
    async fn create_initiatives(&self, user_id: &str, career_goals: &str) -> PortResult<()>;

    async fn create_advice(&self, user_id: &str) -> PortResult<()>;

    async fn create_manuscript(&self, user_id: &str) -> PortResult<()>;
}
