//! services/api/src/adapters/docstore.rs
//!
//! PostgreSQL implementation of the `DocumentStore` port. Documents live in a
//! single JSONB table keyed by path; a trigger publishes every write on the
//! `document_changes` channel. One `PgListener` per store follows that channel
//! and fans each notification out to every `changes()` stream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use companion_core::docpath::{child, id_of, parent_of};
use companion_core::domain::new_id;
use companion_core::ports::{
    Change, ChangeStream, DocumentSnapshot, DocumentStore, PortError, PortResult,
};
use serde_json::{Map, Value};
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, OnceCell};
use tracing::{error, info, warn};

const CHANGE_CHANNEL: &str = "document_changes";
const CHANGE_BUFFER: usize = 256;
const LISTENER_RETRY: Duration = Duration::from_secs(1);

/// The store's single change listener and its subscribers.
struct ChangeFeed {
    sender: broadcast::Sender<Change>,
    started: OnceCell<()>,
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    feed: Arc<ChangeFeed>,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        let (sender, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            pool,
            feed: Arc::new(ChangeFeed {
                sender,
                started: OnceCell::new(),
            }),
        }
    }

    /// Connects the listener on first use and spawns the task that forwards its
    /// notifications. The listener holds one connection outside the pool.
    async fn start_listener(&self) -> PortResult<()> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(unexpected)?;
        listener.listen(CHANGE_CHANNEL).await.map_err(unexpected)?;
        info!("Listening for document changes on '{}'", CHANGE_CHANNEL);

        let feed = Arc::downgrade(&self.feed);
        tokio::spawn(async move {
            loop {
                let change = match listener.try_recv().await {
                    Ok(Some(notification)) => Change::Path(notification.payload().to_string()),
                    // The connection dropped; the listener reconnects on the next call
                    // but anything published in between is lost.
                    Ok(None) => {
                        warn!("Document change listener lost its connection; resyncing.");
                        Change::Resync
                    }
                    Err(e) => {
                        error!("Document change listener failed: {:?}", e);
                        tokio::time::sleep(LISTENER_RETRY).await;
                        Change::Resync
                    }
                };
                let Some(feed) = feed.upgrade() else {
                    break;
                };
                // Sending only fails while nobody is subscribed.
                let _ = feed.sender.send(change);
            }
        });
        Ok(())
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    path: String,
    data: Json<Map<String, Value>>,
    create_time: DateTime<Utc>,
}
impl DocumentRecord {
    fn into_snapshot(self) -> DocumentSnapshot {
        DocumentSnapshot {
            id: id_of(&self.path).to_string(),
            data: self.data.0,
            create_time: self.create_time,
            path: self.path,
        }
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, path: &str) -> PortResult<Option<DocumentSnapshot>> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT path, data, create_time FROM documents WHERE path = $1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(DocumentRecord::into_snapshot))
    }

    async fn set(&self, path: &str, data: Map<String, Value>) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO documents (path, parent, data) VALUES ($1, $2, $3) \
             ON CONFLICT (path) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(path)
        .bind(parent_of(path))
        .bind(Json(&data))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn merge(&self, path: &str, data: Map<String, Value>) -> PortResult<()> {
        let result = sqlx::query("UPDATE documents SET data = data || $2 WHERE path = $1")
            .bind(path)
            .bind(Json(&data))
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Document {} not found", path)));
        }
        Ok(())
    }

    async fn create_if_absent(&self, path: &str, data: Map<String, Value>) -> PortResult<bool> {
        let result = sqlx::query(
            "INSERT INTO documents (path, parent, data) VALUES ($1, $2, $3) \
             ON CONFLICT (path) DO NOTHING",
        )
        .bind(path)
        .bind(parent_of(path))
        .bind(Json(&data))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn add(&self, collection: &str, data: Map<String, Value>) -> PortResult<DocumentSnapshot> {
        let path = child(collection, &new_id())?;
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        // Writers to the same collection queue here, so each one sees the
        // previous create_time and stays strictly after it.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        let record = sqlx::query_as::<_, DocumentRecord>(
            "INSERT INTO documents (path, parent, data, create_time) \
             VALUES ($1, $2, $3, GREATEST( \
                 clock_timestamp(), \
                 (SELECT MAX(create_time) + INTERVAL '1 microsecond' FROM documents WHERE parent = $2))) \
             RETURNING path, data, create_time",
        )
        .bind(&path)
        .bind(collection)
        .bind(Json(&data))
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(record.into_snapshot())
    }

    async fn list(&self, collection: &str) -> PortResult<Vec<DocumentSnapshot>> {
        let records = sqlx::query_as::<_, DocumentRecord>(
            "SELECT path, data, create_time FROM documents WHERE parent = $1 \
             ORDER BY create_time ASC, seq ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(DocumentRecord::into_snapshot).collect())
    }

    async fn changes(&self) -> PortResult<ChangeStream> {
        self.feed
            .started
            .get_or_try_init(|| self.start_listener())
            .await?;
        let mut rx = self.feed.sender.subscribe();
        Ok(Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(change) => yield change,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Change feed subscriber skipped {} notifications; resyncing.", skipped);
                        yield Change::Resync;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}
