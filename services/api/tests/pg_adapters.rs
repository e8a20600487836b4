//! Postgres adapter tests.
//!
//! Each test gets a fresh database with the embedded migrations applied. They
//! need a reachable server: `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use api_lib::adapters::{PgDocumentStore, PgStore};
use chrono::{DateTime, Duration, Utc};
use companion_core::calendar::{home_offset, start_of_today, ManualClock};
use companion_core::domain::{
    new_id, NewCareerGoal, NewInitiative, NewQuest, NewRoutine, RoutineCompletion,
};
use companion_core::ports::{Change, ChangeStream, DocumentStore, PortError, RelationalStore};
use futures::StreamExt;
use serde_json::{json, Map, Value};
use sqlx::PgPool;

fn store(pool: PgPool, now: DateTime<Utc>) -> PgStore {
    PgStore::new(
        pool,
        Arc::new(ManualClock::new(now)),
        home_offset(9).unwrap(),
    )
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn routine(user_id: &str) -> NewRoutine {
    NewRoutine {
        user_id: user_id.to_string(),
        title: "Stretch".to_string(),
        description: String::new(),
        frequency: "毎日".to_string(),
        time: "07:00".to_string(),
        category: "健康".to_string(),
    }
}

async fn insert_routine(pool: &PgPool, created_at: DateTime<Utc>, deleted: bool) -> String {
    let id = new_id();
    sqlx::query(
        "INSERT INTO routines (id, user_id, title, frequency, category, created_at, deleted) \
         VALUES ($1, 'u1', 'Walk', '毎日', '健康', $2, $3)",
    )
    .bind(&id)
    .bind(created_at)
    .bind(deleted)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn insert_article(pool: &PgPool, user_id: &str) -> String {
    let id = new_id();
    sqlx::query(
        "INSERT INTO information (id, user_id, url, category, title, body, recommend_level) \
         VALUES ($1, $2, 'https://news.example/1', 'tech', 'Title', 'Body', 3)",
    )
    .bind(&id)
    .bind(user_id)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn flip(db: &PgStore, id: &str, completed: bool) -> RoutineCompletion {
    db.update_routine_completion("u1", id, completed)
        .await
        .unwrap()
        .expect("routine should be updatable")
}

async fn next_change(stream: &mut ChangeStream) -> Change {
    tokio::time::timeout(StdDuration::from_secs(5), stream.next())
        .await
        .expect("no change within 5s")
        .expect("change feed ended")
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL pointing at Postgres"]
async fn routine_streak_follows_completion_flips(pool: PgPool) {
    let db = store(pool, Utc::now());
    let created = db.create_routine(routine("u1")).await.unwrap();
    assert_eq!(created.streak, 0);
    assert!(!created.completed);

    let id = created.id.as_str();
    let done = flip(&db, id, true).await;
    assert_eq!((done.completed, done.streak), (true, 1));
    let again = flip(&db, id, true).await;
    assert_eq!(again.streak, 1);
    let undone = flip(&db, id, false).await;
    assert_eq!((undone.completed, undone.streak), (false, 0));
    let floor = flip(&db, id, false).await;
    assert_eq!(floor.streak, 0);

    // Another user's id and a deleted routine are both left untouched.
    assert!(db
        .update_routine_completion("u2", id, true)
        .await
        .unwrap()
        .is_none());
    assert_eq!(db.delete_routine(id).await.unwrap(), 1);
    assert!(db
        .update_routine_completion("u1", id, true)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL pointing at Postgres"]
async fn todays_routines_start_at_home_midnight(pool: PgPool) {
    let now = Utc::now();
    let midnight = start_of_today(now, home_offset(9).unwrap());
    let on_boundary = insert_routine(&pool, midnight, false).await;
    insert_routine(&pool, midnight - Duration::microseconds(1), false).await;
    insert_routine(&pool, midnight, true).await;

    let db = store(pool, now);
    let today: Vec<String> = db
        .get_todays_routines("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(today, vec![on_boundary]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL pointing at Postgres"]
async fn task_writes_by_primary_key(pool: PgPool) {
    let db = store(pool, Utc::now());
    let quest = db
        .create_task(NewQuest {
            user_id: "u1".to_string(),
            title: "Read docs".to_string(),
            description: String::new(),
            category: "学習".to_string(),
            estimated_time: "10分".to_string(),
        })
        .await
        .unwrap();
    assert!(!quest.completed);
    assert!(quest.recommend.is_empty());
    assert_eq!(quest.created_at.offset().local_minus_utc(), 9 * 3600);

    assert_eq!(db.update_task_completion(&quest.id, true).await.unwrap(), Some(true));
    assert_eq!(db.update_task_completion("missing", true).await.unwrap(), None);

    assert_eq!(db.delete_task(&quest.id).await.unwrap(), 1);
    assert!(db.get_task(&quest.id).await.unwrap().is_none());
    assert!(db.get_daily_tasks("u1").await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL pointing at Postgres"]
async fn scoped_writes_ignore_other_users(pool: PgPool) {
    let article = insert_article(&pool, "u1").await;
    let db = store(pool, Utc::now());

    let goals = db
        .create_career_goals(
            "u1",
            &[
                NewCareerGoal {
                    career_title: "SRE".to_string(),
                    career_body: "on-call".to_string(),
                    target_period: "1年".to_string(),
                },
                NewCareerGoal {
                    career_title: "Lead".to_string(),
                    career_body: String::new(),
                    target_period: "3年".to_string(),
                },
            ],
        )
        .await
        .unwrap();
    assert_eq!(goals.len(), 2);
    assert_eq!(db.delete_career_goal("u2", &goals[0].id).await.unwrap(), 0);
    assert_eq!(db.get_career_goals("u1").await.unwrap().len(), 2);
    assert_eq!(db.delete_career_goal("u1", &goals[0].id).await.unwrap(), 1);

    let initiatives = db
        .create_initiatives(
            "u1",
            &[NewInitiative {
                title: "Read SRE book".to_string(),
                body: String::new(),
                target_period: "3ヶ月".to_string(),
            }],
        )
        .await
        .unwrap();
    assert_eq!(db.delete_initiative("u2", &initiatives[0].id).await.unwrap(), 0);
    assert_eq!(db.get_initiatives("u1").await.unwrap().len(), 1);

    assert_eq!(db.update_article_favorite("u2", &article, true).await.unwrap(), None);
    assert!(!db.get_articles("u1").await.unwrap()[0].favorite);
    assert_eq!(db.update_article_favorite("u1", &article, true).await.unwrap(), Some(true));
    assert!(db.get_articles("u1").await.unwrap()[0].favorite);
}

// ---------------------------------------------------------------------------
// PgDocumentStore
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL pointing at Postgres"]
async fn create_if_absent_has_one_winner(pool: PgPool) {
    let docs = PgDocumentStore::new(pool);
    let path = "users/u1/sessions/s1";
    let (a, b) = tokio::join!(
        docs.create_if_absent(path, fields(json!({ "writer": "a" }))),
        docs.create_if_absent(path, fields(json!({ "writer": "b" }))),
    );
    assert!(a.unwrap() ^ b.unwrap());
    assert!(!docs
        .create_if_absent(path, fields(json!({ "writer": "c" })))
        .await
        .unwrap());
    let stored = docs.get(path).await.unwrap().unwrap();
    assert_ne!(stored.data["writer"], json!("c"));

    let missing = docs
        .merge("users/u1/sessions/s2", fields(json!({ "x": 1 })))
        .await;
    assert!(matches!(missing, Err(PortError::NotFound(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL pointing at Postgres"]
async fn concurrent_adds_get_strictly_increasing_create_times(pool: PgPool) {
    let docs = PgDocumentStore::new(pool);
    let collection = "users/u1/sessions/s1/messages";
    let writers = (0..16).map(|n| {
        let docs = docs.clone();
        tokio::spawn(async move {
            docs.add(collection, fields(json!({ "n": n }))).await.unwrap()
        })
    });
    for writer in writers.collect::<Vec<_>>() {
        writer.await.unwrap();
    }

    let listed = docs.list(collection).await.unwrap();
    assert_eq!(listed.len(), 16);
    assert!(listed
        .windows(2)
        .all(|pair| pair[0].create_time < pair[1].create_time));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL pointing at Postgres"]
async fn every_subscriber_sees_each_write(pool: PgPool) {
    let docs = PgDocumentStore::new(pool);
    let mut first = docs.changes().await.unwrap();
    let mut second = docs.changes().await.unwrap();

    docs.set("users/u1", fields(json!({ "status": "creating" })))
        .await
        .unwrap();
    let expected = Change::Path("users/u1".to_string());
    assert_eq!(next_change(&mut first).await, expected);
    assert_eq!(next_change(&mut second).await, expected);

    docs.merge("users/u1", fields(json!({ "status": "completed" })))
        .await
        .unwrap();
    assert_eq!(next_change(&mut first).await, expected);
    let user = docs.get("users/u1").await.unwrap().unwrap();
    assert_eq!(user.data["status"], json!("completed"));
}
