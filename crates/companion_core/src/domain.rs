//! crates/companion_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs are independent of any particular database; they carry the
//! JSON shape the browser consumes (camelCase field names).

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;
use utoipa::ToSchema;

/// Timestamps are always expressed in the application's home timezone.
pub type Timestamp = DateTime<FixedOffset>;

/// Generates a new 26-character, lexicographically sortable identifier.
pub fn new_id() -> String {
    Ulid::new().to_string()
}

/// The closed set of quest/routine categories offered by the UI.
pub const QUEST_CATEGORIES: [&str; 9] = [
    "学習",
    "開発",
    "調査",
    "SNS",
    "OSS",
    "ブログ",
    "イベント",
    "趣味",
    "その他",
];

pub fn is_known_category(category: &str) -> bool {
    QUEST_CATEGORIES.contains(&category)
}

/// Persona that greets a brand new session.
pub const DEFAULT_AGENT: &str = "Misaki";

/// Frequency given to a quest promoted to a routine when the caller omits one.
pub const DEFAULT_ROUTINE_FREQUENCY: &str = "毎日";

//=========================================================================================
// Document-store entities
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum UserStatus {
    Creating,
    WaitingForTutorial,
    Created,
}

/// Progress of the externally generated first greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum GreetState {
    Yet,
    Done,
}

/// The user profile/status document at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    pub status: UserStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_greet: Option<GreetState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iot_device_url: Option<String>,
}

/// Basic profile fields written onto the user document after onboarding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfileUpdate {
    pub nickname: String,
    pub gender: String,
    pub age: String,
    pub location: String,
    pub iot_device_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Success,
    Failed,
    Thinking,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FunctionCall {
    pub id: String,
    #[schema(value_type = Object)]
    pub args: Map<String, Value>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    #[schema(value_type = Object)]
    pub response: Map<String, Value>,
}

/// One chat turn under `users/{uid}/sessions/{sid}/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
    pub loading: bool,
    pub status: MessageStatus,
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

/// Narrow audit row stored in the relational `chats` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatLogEntry {
    pub id: String,
    pub role: ChatRole,
    pub message: String,
}

//=========================================================================================
// Relational entities
//=========================================================================================

/// A single-occurrence, same-day task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub recommend: String,
    pub category: String,
    pub estimated_time: String,
    pub completed: bool,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewQuest {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub estimated_time: String,
}

/// A recurring habit with a streak counter. Deletion is soft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub frequency: String,
    pub time: String,
    pub streak: i32,
    pub category: String,
    pub completed: bool,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    pub deleted: bool,
}

#[derive(Debug, Clone)]
pub struct NewRoutine {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub frequency: String,
    pub time: String,
    pub category: String,
}

/// Result of a routine completion toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoutineCompletion {
    pub completed: bool,
    pub streak: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CareerGoal {
    pub id: String,
    pub user_id: String,
    pub career_title: String,
    pub career_body: String,
    pub target_period: String,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct NewCareerGoal {
    pub career_title: String,
    pub career_body: String,
    pub target_period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Initiative {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub target_period: String,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct NewInitiative {
    pub title: String,
    pub body: String,
    pub target_period: String,
}

/// A curated news article. Only `favorite` is mutable from this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub recommend_level: i32,
    pub recommend_sentence: String,
    pub favorite: bool,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Advice {
    pub id: String,
    pub user_id: String,
    pub markdown: String,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    pub deleted: bool,
}

/// Everything the onboarding wizard collects.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileData {
    pub nickname: String,
    pub gender: String,
    pub age: String,
    pub location: String,
    pub iot_device_url: Option<String>,
    pub career_goals: Vec<NewCareerGoal>,
    pub initiatives: Vec<NewInitiative>,
    pub skills: Vec<String>,
    pub current_role: String,
    pub experience: String,
    pub projects: String,
    pub learning_methods: Vec<String>,
    pub daily_study_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_26_chars_and_sortable() {
        let a = new_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_id();
        assert_eq!(a.len(), 26);
        assert!(a < b);
    }

    #[test]
    fn user_status_uses_camel_case_on_the_wire() {
        let json = serde_json::to_string(&UserStatus::WaitingForTutorial).unwrap();
        assert_eq!(json, "\"waitingForTutorial\"");
    }

    #[test]
    fn profile_data_tolerates_missing_fields() {
        let profile: ProfileData =
            serde_json::from_str(r#"{"nickname":"taro","careerGoals":[{"careerTitle":"SRE"}]}"#)
                .unwrap();
        assert_eq!(profile.nickname, "taro");
        assert_eq!(profile.career_goals[0].career_title, "SRE");
        assert!(profile.career_goals[0].career_body.is_empty());
        assert!(profile.skills.is_empty());
    }
}
