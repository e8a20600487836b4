//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `RelationalStore` port, used for
//! `STORAGE_BACKEND=memory` and by the test-suite. It mirrors the SQL adapter's
//! semantics: newest-first ordering, user-scoped deletes, soft-deleted routines.

use async_trait::async_trait;
use chrono::FixedOffset;
use companion_core::calendar::{start_of_today, Clock};
use companion_core::domain::{
    new_id, Advice, Article, CareerGoal, ChatLogEntry, Initiative, NewCareerGoal, NewInitiative,
    NewQuest, NewRoutine, ProfileData, Quest, Routine, RoutineCompletion, Timestamp,
};
use companion_core::onboarding::profile_memory_entries;
use companion_core::ports::{PortResult, RelationalStore};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    tasks: Vec<Quest>,
    routines: Vec<Routine>,
    career_goals: Vec<CareerGoal>,
    initiatives: Vec<Initiative>,
    articles: Vec<Article>,
    advices: Vec<Advice>,
    memory: Vec<(String, String)>,
    chats: Vec<ChatLogEntry>,
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
            offset,
        }
    }

    fn now(&self) -> Timestamp {
        self.clock.now().with_timezone(&self.offset)
    }

    /// Stores an article as the external ingestion process would.
    pub async fn insert_article(&self, article: Article) {
        self.tables.lock().await.articles.push(article);
    }

    /// Stores an advice row as the external advice generator would.
    pub async fn insert_advice(&self, advice: Advice) {
        self.tables.lock().await.advices.push(advice);
    }

    /// Every routine of the user, soft-deleted ones included.
    pub async fn all_routines(&self, user_id: &str) -> Vec<Routine> {
        let tables = self.tables.lock().await;
        tables
            .routines
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Contents of the user's memory log, oldest first.
    pub async fn memory_entries(&self, user_id: &str) -> Vec<String> {
        let tables = self.tables.lock().await;
        tables
            .memory
            .iter()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, content)| content.clone())
            .collect()
    }

    pub async fn chat_log(&self) -> Vec<ChatLogEntry> {
        self.tables.lock().await.chats.clone()
    }
}

/// Newest first; rows sharing a timestamp keep reverse insertion order.
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> Timestamp) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().rev().cloned().collect();
    out.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    out
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn get_daily_tasks(&self, user_id: &str) -> PortResult<Vec<Quest>> {
        let tables = self.tables.lock().await;
        let mine: Vec<Quest> = tables
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(&mine, |t| t.created_at))
    }

    async fn get_task(&self, id: &str) -> PortResult<Option<Quest>> {
        let tables = self.tables.lock().await;
        Ok(tables.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn create_task(&self, input: NewQuest) -> PortResult<Quest> {
        let quest = Quest {
            id: new_id(),
            user_id: input.user_id,
            title: input.title,
            description: input.description,
            recommend: String::new(),
            category: input.category,
            estimated_time: input.estimated_time,
            completed: false,
            created_at: self.now(),
        };
        self.tables.lock().await.tasks.push(quest.clone());
        Ok(quest)
    }

    async fn update_task_completion(&self, id: &str, completed: bool) -> PortResult<Option<bool>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.tasks.iter_mut().find(|t| t.id == id).map(|task| {
            task.completed = completed;
            completed
        }))
    }

    async fn delete_task(&self, id: &str) -> PortResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.tasks.len();
        tables.tasks.retain(|t| t.id != id);
        Ok((before - tables.tasks.len()) as u64)
    }

    async fn create_user_profile(&self, user_id: &str, profile: &ProfileData) -> PortResult<usize> {
        let entries = profile_memory_entries(profile);
        let count = entries.len();
        let mut tables = self.tables.lock().await;
        tables
            .memory
            .extend(entries.into_iter().map(|content| (user_id.to_string(), content)));
        Ok(count)
    }

    async fn create_career_goals(
        &self,
        user_id: &str,
        goals: &[NewCareerGoal],
    ) -> PortResult<Vec<CareerGoal>> {
        let now = self.now();
        let created: Vec<CareerGoal> = goals
            .iter()
            .map(|goal| CareerGoal {
                id: new_id(),
                user_id: user_id.to_string(),
                career_title: goal.career_title.clone(),
                career_body: goal.career_body.clone(),
                target_period: goal.target_period.clone(),
                created_at: now,
                deleted: false,
            })
            .collect();
        self.tables
            .lock()
            .await
            .career_goals
            .extend(created.iter().cloned());
        Ok(created)
    }

    async fn get_career_goals(&self, user_id: &str) -> PortResult<Vec<CareerGoal>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .career_goals
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_career_goal(&self, user_id: &str, id: &str) -> PortResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.career_goals.len();
        tables
            .career_goals
            .retain(|g| !(g.user_id == user_id && g.id == id));
        Ok((before - tables.career_goals.len()) as u64)
    }

    async fn create_initiatives(
        &self,
        user_id: &str,
        initiatives: &[NewInitiative],
    ) -> PortResult<Vec<Initiative>> {
        let now = self.now();
        let created: Vec<Initiative> = initiatives
            .iter()
            .map(|initiative| Initiative {
                id: new_id(),
                user_id: user_id.to_string(),
                title: initiative.title.clone(),
                body: initiative.body.clone(),
                target_period: initiative.target_period.clone(),
                created_at: now,
                deleted: false,
            })
            .collect();
        self.tables
            .lock()
            .await
            .initiatives
            .extend(created.iter().cloned());
        Ok(created)
    }

    async fn get_initiatives(&self, user_id: &str) -> PortResult<Vec<Initiative>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .initiatives
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_initiative(&self, user_id: &str, id: &str) -> PortResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.initiatives.len();
        tables
            .initiatives
            .retain(|i| !(i.user_id == user_id && i.id == id));
        Ok((before - tables.initiatives.len()) as u64)
    }

    async fn get_articles(&self, user_id: &str) -> PortResult<Vec<Article>> {
        let tables = self.tables.lock().await;
        let mine: Vec<Article> = tables
            .articles
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(&mine, |a| a.created_at))
    }

    async fn update_article_favorite(
        &self,
        user_id: &str,
        id: &str,
        favorite: bool,
    ) -> PortResult<Option<bool>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .articles
            .iter_mut()
            .find(|a| a.user_id == user_id && a.id == id)
            .map(|article| {
                article.favorite = favorite;
                favorite
            }))
    }

    async fn get_todays_routines(&self, user_id: &str) -> PortResult<Vec<Routine>> {
        let since = start_of_today(self.clock.now(), self.offset);
        let tables = self.tables.lock().await;
        let todays: Vec<Routine> = tables
            .routines
            .iter()
            .filter(|r| r.user_id == user_id && !r.deleted && r.created_at >= since)
            .cloned()
            .collect();
        Ok(newest_first(&todays, |r| r.created_at))
    }

    async fn create_routine(&self, input: NewRoutine) -> PortResult<Routine> {
        let routine = Routine {
            id: new_id(),
            user_id: input.user_id,
            title: input.title,
            description: input.description,
            frequency: input.frequency,
            time: input.time,
            streak: 0,
            category: input.category,
            completed: false,
            created_at: self.now(),
            deleted: false,
        };
        self.tables.lock().await.routines.push(routine.clone());
        Ok(routine)
    }

    async fn update_routine_completion(
        &self,
        user_id: &str,
        id: &str,
        completed: bool,
    ) -> PortResult<Option<RoutineCompletion>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .routines
            .iter_mut()
            .find(|r| r.user_id == user_id && r.id == id && !r.deleted)
            .map(|routine| {
                if completed && !routine.completed {
                    routine.streak += 1;
                } else if !completed && routine.completed {
                    routine.streak = (routine.streak - 1).max(0);
                }
                routine.completed = completed;
                RoutineCompletion {
                    completed,
                    streak: routine.streak,
                }
            }))
    }

    async fn delete_routine(&self, id: &str) -> PortResult<u64> {
        let mut tables = self.tables.lock().await;
        let mut affected = 0;
        for routine in tables.routines.iter_mut().filter(|r| r.id == id) {
            routine.deleted = true;
            affected += 1;
        }
        Ok(affected)
    }

    async fn get_advice(&self, user_id: &str) -> PortResult<Option<Advice>> {
        let tables = self.tables.lock().await;
        let mine: Vec<Advice> = tables
            .advices
            .iter()
            .filter(|a| a.user_id == user_id && !a.deleted)
            .cloned()
            .collect();
        Ok(newest_first(&mine, |a| a.created_at).into_iter().next())
    }

    async fn create_chat_message(&self, entry: &ChatLogEntry) -> PortResult<()> {
        self.tables.lock().await.chats.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use companion_core::calendar::{home_offset, ManualClock};

    fn store() -> (Arc<ManualClock>, MemoryStore) {
        // 12:00 on 2026-10-19, Tokyo time.
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap(),
        ));
        let store = MemoryStore::new(clock.clone(), home_offset(9).unwrap());
        (clock, store)
    }

    fn routine(user_id: &str, title: &str) -> NewRoutine {
        NewRoutine {
            user_id: user_id.into(),
            title: title.into(),
            description: String::new(),
            frequency: "毎日".into(),
            time: "07:00".into(),
            category: "学習".into(),
        }
    }

    #[tokio::test]
    async fn routine_created_just_before_midnight_is_not_today() {
        let (clock, store) = store();
        // 23:59:59 Tokyo time on the 18th.
        clock.set(Utc.with_ymd_and_hms(2026, 10, 18, 14, 59, 59).unwrap());
        store.create_routine(routine("u1", "yesterday")).await.unwrap();
        clock.advance(Duration::seconds(1));
        store.create_routine(routine("u1", "midnight")).await.unwrap();
        clock.advance(Duration::hours(9));

        let todays = store.get_todays_routines("u1").await.unwrap();
        let titles: Vec<_> = todays.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["midnight"]);
    }

    #[tokio::test]
    async fn routine_delete_is_soft() {
        let (_clock, store) = store();
        let created = store.create_routine(routine("u1", "stretch")).await.unwrap();
        assert_eq!(store.delete_routine(&created.id).await.unwrap(), 1);

        assert!(store.get_todays_routines("u1").await.unwrap().is_empty());
        let all = store.all_routines("u1").await;
        assert_eq!(all.len(), 1);
        assert!(all[0].deleted);
    }

    #[tokio::test]
    async fn streak_follows_completion_transitions() {
        let (_clock, store) = store();
        let created = store.create_routine(routine("u1", "run")).await.unwrap();

        let done = store
            .update_routine_completion("u1", &created.id, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.streak, 1);
        // Re-sending the same flag leaves the streak alone.
        let again = store
            .update_routine_completion("u1", &created.id, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.streak, 1);
        let undone = store
            .update_routine_completion("u1", &created.id, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(undone, RoutineCompletion { completed: false, streak: 0 });
        assert!(store
            .update_routine_completion("someone-else", &created.id, true)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn scoped_deletes_ignore_other_users() {
        let (_clock, store) = store();
        let goals = store
            .create_career_goals(
                "u1",
                &[NewCareerGoal {
                    career_title: "SRE".into(),
                    career_body: "自動化".into(),
                    target_period: "3年".into(),
                }],
            )
            .await
            .unwrap();
        let id = &goals[0].id;
        assert_eq!(store.delete_career_goal("u2", id).await.unwrap(), 0);
        assert_eq!(store.get_career_goals("u1").await.unwrap().len(), 1);
        assert_eq!(store.delete_career_goal("u1", id).await.unwrap(), 1);
        assert!(store.get_career_goals("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tasks_are_newest_first_and_hard_deleted() {
        let (clock, store) = store();
        let first = store
            .create_task(NewQuest {
                user_id: "u1".into(),
                title: "first".into(),
                description: String::new(),
                category: "学習".into(),
                estimated_time: "10分".into(),
            })
            .await
            .unwrap();
        clock.advance(Duration::minutes(1));
        let second = store
            .create_task(NewQuest {
                user_id: "u1".into(),
                title: "second".into(),
                description: String::new(),
                category: "開発".into(),
                estimated_time: "30分".into(),
            })
            .await
            .unwrap();

        let tasks = store.get_daily_tasks("u1").await.unwrap();
        assert_eq!(tasks[0].id, second.id);
        assert_eq!(tasks[1].id, first.id);

        store.delete_task(&first.id).await.unwrap();
        assert!(store.get_task(&first.id).await.unwrap().is_none());
        assert_eq!(store.get_daily_tasks("u1").await.unwrap().len(), 1);
    }
}
