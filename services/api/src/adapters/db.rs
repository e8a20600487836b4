//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RelationalStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`. Each call borrows one pooled
//! connection for its statement and hands it back when the statement finishes.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use companion_core::calendar::{start_of_today, Clock};
use companion_core::domain::{
    new_id, Advice, Article, CareerGoal, ChatLogEntry, ChatRole, Initiative, NewCareerGoal,
    NewInitiative, NewQuest, NewRoutine, ProfileData, Quest, Routine, RoutineCompletion,
};
use companion_core::onboarding::{profile_memory_entries, INITIALIZE_CATEGORY};
use companion_core::ports::{PortError, PortResult, RelationalStore};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RelationalStore` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl PgStore {
    /// Creates a new `PgStore`. Timestamps are returned in `offset`.
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self {
            pool,
            clock,
            offset,
        }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const TASK_COLUMNS: &str =
    "id, user_id, title, description, recommend, category, estimated_time, completed, created_at";

#[derive(FromRow)]
struct TaskRecord {
    id: String,
    user_id: String,
    title: String,
    description: String,
    recommend: String,
    category: String,
    estimated_time: String,
    completed: bool,
    created_at: DateTime<Utc>,
}
impl TaskRecord {
    fn to_domain(self, offset: FixedOffset) -> Quest {
        Quest {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            recommend: self.recommend,
            category: self.category,
            estimated_time: self.estimated_time,
            completed: self.completed,
            created_at: self.created_at.with_timezone(&offset),
        }
    }
}

const ROUTINE_COLUMNS: &str =
    "id, user_id, title, description, frequency, time, streak, category, completed, created_at, deleted";

#[derive(FromRow)]
struct RoutineRecord {
    id: String,
    user_id: String,
    title: String,
    description: String,
    frequency: String,
    time: String,
    streak: i32,
    category: String,
    completed: bool,
    created_at: DateTime<Utc>,
    deleted: bool,
}
impl RoutineRecord {
    fn to_domain(self, offset: FixedOffset) -> Routine {
        Routine {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            frequency: self.frequency,
            time: self.time,
            streak: self.streak,
            category: self.category,
            completed: self.completed,
            created_at: self.created_at.with_timezone(&offset),
            deleted: self.deleted,
        }
    }
}

const CAREER_GOAL_COLUMNS: &str =
    "id, user_id, career_title, career_body, target_period, created_at, deleted";

#[derive(FromRow)]
struct CareerGoalRecord {
    id: String,
    user_id: String,
    career_title: String,
    career_body: String,
    target_period: String,
    created_at: DateTime<Utc>,
    deleted: bool,
}
impl CareerGoalRecord {
    fn to_domain(self, offset: FixedOffset) -> CareerGoal {
        CareerGoal {
            id: self.id,
            user_id: self.user_id,
            career_title: self.career_title,
            career_body: self.career_body,
            target_period: self.target_period,
            created_at: self.created_at.with_timezone(&offset),
            deleted: self.deleted,
        }
    }
}

const INITIATIVE_COLUMNS: &str = "id, user_id, title, body, target_period, created_at, deleted";

#[derive(FromRow)]
struct InitiativeRecord {
    id: String,
    user_id: String,
    title: String,
    body: String,
    target_period: String,
    created_at: DateTime<Utc>,
    deleted: bool,
}
impl InitiativeRecord {
    fn to_domain(self, offset: FixedOffset) -> Initiative {
        Initiative {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            body: self.body,
            target_period: self.target_period,
            created_at: self.created_at.with_timezone(&offset),
            deleted: self.deleted,
        }
    }
}

#[derive(FromRow)]
struct ArticleRecord {
    id: String,
    user_id: String,
    url: String,
    category: String,
    title: String,
    body: String,
    recommend_level: i32,
    recommend_sentence: String,
    favorite: bool,
    created_at: DateTime<Utc>,
}
impl ArticleRecord {
    fn to_domain(self, offset: FixedOffset) -> Article {
        Article {
            id: self.id,
            user_id: self.user_id,
            url: self.url,
            category: self.category,
            title: self.title,
            body: self.body,
            recommend_level: self.recommend_level,
            recommend_sentence: self.recommend_sentence,
            favorite: self.favorite,
            created_at: self.created_at.with_timezone(&offset),
        }
    }
}

#[derive(FromRow)]
struct AdviceRecord {
    id: String,
    user_id: String,
    markdown: String,
    created_at: DateTime<Utc>,
    deleted: bool,
}
impl AdviceRecord {
    fn to_domain(self, offset: FixedOffset) -> Advice {
        Advice {
            id: self.id,
            user_id: self.user_id,
            markdown: self.markdown,
            created_at: self.created_at.with_timezone(&offset),
            deleted: self.deleted,
        }
    }
}

fn role_label(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Model => "model",
    }
}

//=========================================================================================
// `RelationalStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RelationalStore for PgStore {
    async fn get_daily_tasks(&self, user_id: &str) -> PortResult<Vec<Quest>> {
        let records = sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(self.offset)).collect())
    }

    async fn get_task(&self, id: &str) -> PortResult<Option<Quest>> {
        let record = sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain(self.offset)))
    }

    async fn create_task(&self, input: NewQuest) -> PortResult<Quest> {
        let record = sqlx::query_as::<_, TaskRecord>(&format!(
            "INSERT INTO tasks (id, user_id, title, description, recommend, category, completed, estimated_time, created_at) \
             VALUES ($1, $2, $3, $4, '', $5, false, $6, NOW()) RETURNING {TASK_COLUMNS}"
        ))
        .bind(new_id())
        .bind(&input.user_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.estimated_time)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain(self.offset))
    }

    async fn update_task_completion(&self, id: &str, completed: bool) -> PortResult<Option<bool>> {
        sqlx::query_scalar::<_, bool>(
            "UPDATE tasks SET completed = $1 WHERE id = $2 RETURNING completed",
        )
        .bind(completed)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn delete_task(&self, id: &str) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn create_user_profile(&self, user_id: &str, profile: &ProfileData) -> PortResult<usize> {
        let entries = profile_memory_entries(profile);
        if entries.is_empty() {
            return Ok(0);
        }
        let count = entries.len();

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO memory (id, user_id, category, content, created_at, updated_at) ",
        );
        builder.push_values(entries, |mut row, content| {
            row.push_bind(new_id())
                .push_bind(user_id.to_string())
                .push_bind(INITIALIZE_CATEGORY)
                .push_bind(content)
                .push("NOW()")
                .push("NOW()");
        });
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count)
    }

    async fn create_career_goals(
        &self,
        user_id: &str,
        goals: &[NewCareerGoal],
    ) -> PortResult<Vec<CareerGoal>> {
        if goals.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO career_goals (id, user_id, career_title, career_body, target_period, created_at, deleted) ",
        );
        builder.push_values(goals, |mut row, goal| {
            row.push_bind(new_id())
                .push_bind(user_id.to_string())
                .push_bind(goal.career_title.clone())
                .push_bind(goal.career_body.clone())
                .push_bind(goal.target_period.clone())
                .push("NOW()")
                .push("false");
        });
        builder.push(format!(" RETURNING {CAREER_GOAL_COLUMNS}"));
        let records = builder
            .build_query_as::<CareerGoalRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(self.offset)).collect())
    }

    async fn get_career_goals(&self, user_id: &str) -> PortResult<Vec<CareerGoal>> {
        let records = sqlx::query_as::<_, CareerGoalRecord>(&format!(
            "SELECT {CAREER_GOAL_COLUMNS} FROM career_goals WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(self.offset)).collect())
    }

    async fn delete_career_goal(&self, user_id: &str, id: &str) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM career_goals WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn create_initiatives(
        &self,
        user_id: &str,
        initiatives: &[NewInitiative],
    ) -> PortResult<Vec<Initiative>> {
        if initiatives.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO initiatives (id, user_id, title, body, target_period, created_at, deleted) ",
        );
        builder.push_values(initiatives, |mut row, initiative| {
            row.push_bind(new_id())
                .push_bind(user_id.to_string())
                .push_bind(initiative.title.clone())
                .push_bind(initiative.body.clone())
                .push_bind(initiative.target_period.clone())
                .push("NOW()")
                .push("false");
        });
        builder.push(format!(" RETURNING {INITIATIVE_COLUMNS}"));
        let records = builder
            .build_query_as::<InitiativeRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(self.offset)).collect())
    }

    async fn get_initiatives(&self, user_id: &str) -> PortResult<Vec<Initiative>> {
        let records = sqlx::query_as::<_, InitiativeRecord>(&format!(
            "SELECT {INITIATIVE_COLUMNS} FROM initiatives WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(self.offset)).collect())
    }

    async fn delete_initiative(&self, user_id: &str, id: &str) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM initiatives WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn get_articles(&self, user_id: &str) -> PortResult<Vec<Article>> {
        let records = sqlx::query_as::<_, ArticleRecord>(
            "SELECT id, user_id, url, category, title, body, recommend_level, recommend_sentence, favorite, created_at \
             FROM information WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(self.offset)).collect())
    }

    async fn update_article_favorite(
        &self,
        user_id: &str,
        id: &str,
        favorite: bool,
    ) -> PortResult<Option<bool>> {
        sqlx::query_scalar::<_, bool>(
            "UPDATE information SET favorite = $1 WHERE user_id = $2 AND id = $3 RETURNING favorite",
        )
        .bind(favorite)
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn get_todays_routines(&self, user_id: &str) -> PortResult<Vec<Routine>> {
        let since = start_of_today(self.clock.now(), self.offset);
        let records = sqlx::query_as::<_, RoutineRecord>(&format!(
            "SELECT {ROUTINE_COLUMNS} FROM routines \
             WHERE user_id = $1 AND deleted = false AND created_at >= $2 \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(self.offset)).collect())
    }

    async fn create_routine(&self, input: NewRoutine) -> PortResult<Routine> {
        let record = sqlx::query_as::<_, RoutineRecord>(&format!(
            "INSERT INTO routines (id, user_id, title, description, frequency, time, streak, category, completed, created_at, deleted) \
             VALUES ($1, $2, $3, $4, $5, $6, 0, $7, false, NOW(), false) RETURNING {ROUTINE_COLUMNS}"
        ))
        .bind(new_id())
        .bind(&input.user_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.frequency)
        .bind(&input.time)
        .bind(&input.category)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain(self.offset))
    }

    async fn update_routine_completion(
        &self,
        user_id: &str,
        id: &str,
        completed: bool,
    ) -> PortResult<Option<RoutineCompletion>> {
        // Right-hand sides see the pre-update row, so the CASE compares against
        // the previous completion flag.
        let row = sqlx::query_as::<_, (bool, i32)>(
            "UPDATE routines SET \
                streak = CASE \
                    WHEN $1 AND NOT completed THEN streak + 1 \
                    WHEN NOT $1 AND completed THEN GREATEST(streak - 1, 0) \
                    ELSE streak END, \
                completed = $1 \
             WHERE user_id = $2 AND id = $3 AND deleted = false \
             RETURNING completed, streak",
        )
        .bind(completed)
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(row.map(|(completed, streak)| RoutineCompletion { completed, streak }))
    }

    async fn delete_routine(&self, id: &str) -> PortResult<u64> {
        let result = sqlx::query("UPDATE routines SET deleted = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn get_advice(&self, user_id: &str) -> PortResult<Option<Advice>> {
        let record = sqlx::query_as::<_, AdviceRecord>(
            "SELECT id, user_id, markdown, created_at, deleted FROM advices \
             WHERE user_id = $1 AND deleted = false ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain(self.offset)))
    }

    async fn create_chat_message(&self, entry: &ChatLogEntry) -> PortResult<()> {
        sqlx::query("INSERT INTO chats (id, role, message, created_at) VALUES ($1, $2, $3, NOW())")
            .bind(&entry.id)
            .bind(role_label(entry.role))
            .bind(&entry.message)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::ChatLog(e.to_string()))?;
        Ok(())
    }
}
