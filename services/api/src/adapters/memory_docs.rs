//! services/api/src/adapters/memory_docs.rs
//!
//! In-process `DocumentStore` with a `broadcast` change feed.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use companion_core::calendar::Clock;
use companion_core::docpath::{child, id_of, parent_of};
use companion_core::domain::new_id;
use companion_core::ports::{
    Change, ChangeStream, DocumentSnapshot, DocumentStore, PortError, PortResult,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const CHANGE_BUFFER: usize = 256;

struct StoredDoc {
    parent: String,
    data: Map<String, Value>,
    create_time: DateTime<Utc>,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    docs: BTreeMap<String, StoredDoc>,
    seq: u64,
    /// Latest creation time handed out per collection.
    latest: HashMap<String, DateTime<Utc>>,
}

impl Inner {
    fn insert(&mut self, path: &str, data: Map<String, Value>, now: DateTime<Utc>) -> DateTime<Utc> {
        let parent = parent_of(path).to_string();
        let create_time = match self.latest.get(&parent) {
            Some(last) if *last >= now => *last + Duration::microseconds(1),
            _ => now,
        };
        self.latest.insert(parent.clone(), create_time);
        self.seq += 1;
        self.docs.insert(
            path.to_string(),
            StoredDoc {
                parent,
                data,
                create_time,
                seq: self.seq,
            },
        );
        create_time
    }
}

fn snapshot(path: &str, doc: &StoredDoc) -> DocumentSnapshot {
    DocumentSnapshot {
        id: id_of(path).to_string(),
        path: path.to_string(),
        data: doc.data.clone(),
        create_time: doc.create_time,
    }
}

pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<String>,
    clock: Arc<dyn Clock>,
}

impl MemoryDocumentStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Mutex::new(Inner::default()),
            changes,
            clock,
        }
    }

    fn publish(&self, path: &str) {
        // No receivers simply means nobody is subscribed right now.
        let _ = self.changes.send(path.to_string());
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &str) -> PortResult<Option<DocumentSnapshot>> {
        let inner = self.inner.lock().await;
        Ok(inner.docs.get(path).map(|doc| snapshot(path, doc)))
    }

    async fn set(&self, path: &str, data: Map<String, Value>) -> PortResult<()> {
        {
            let mut inner = self.inner.lock().await;
            match inner.docs.get_mut(path) {
                Some(doc) => doc.data = data,
                None => {
                    inner.insert(path, data, self.clock.now());
                }
            }
        }
        self.publish(path);
        Ok(())
    }

    async fn merge(&self, path: &str, data: Map<String, Value>) -> PortResult<()> {
        {
            let mut inner = self.inner.lock().await;
            let doc = inner
                .docs
                .get_mut(path)
                .ok_or_else(|| PortError::NotFound(format!("Document {} not found", path)))?;
            doc.data.extend(data);
        }
        self.publish(path);
        Ok(())
    }

    async fn create_if_absent(&self, path: &str, data: Map<String, Value>) -> PortResult<bool> {
        {
            let mut inner = self.inner.lock().await;
            if inner.docs.contains_key(path) {
                return Ok(false);
            }
            inner.insert(path, data, self.clock.now());
        }
        self.publish(path);
        Ok(true)
    }

    async fn add(&self, collection: &str, data: Map<String, Value>) -> PortResult<DocumentSnapshot> {
        let path = child(collection, &new_id())?;
        let snap = {
            let mut inner = self.inner.lock().await;
            let create_time = inner.insert(&path, data.clone(), self.clock.now());
            DocumentSnapshot {
                id: id_of(&path).to_string(),
                path: path.clone(),
                data,
                create_time,
            }
        };
        self.publish(&path);
        Ok(snap)
    }

    async fn list(&self, collection: &str) -> PortResult<Vec<DocumentSnapshot>> {
        let inner = self.inner.lock().await;
        let mut children: Vec<(&String, &StoredDoc)> = inner
            .docs
            .iter()
            .filter(|(_, doc)| doc.parent == collection)
            .collect();
        children.sort_by_key(|(_, doc)| (doc.create_time, doc.seq));
        Ok(children
            .into_iter()
            .map(|(path, doc)| snapshot(path, doc))
            .collect())
    }

    async fn changes(&self) -> PortResult<ChangeStream> {
        let mut rx = self.changes.subscribe();
        Ok(Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(path) => yield Change::Path(path),
                    Err(broadcast::error::RecvError::Lagged(_)) => yield Change::Resync,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use companion_core::calendar::ManualClock;
    use futures::StreamExt;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn store() -> MemoryDocumentStore {
        let frozen = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        MemoryDocumentStore::new(Arc::new(ManualClock::new(frozen)))
    }

    #[tokio::test]
    async fn add_orders_strictly_even_with_a_frozen_clock() {
        let store = store();
        for n in 0..5 {
            store
                .add("users/u1/sessions/s1/messages", fields(json!({ "n": n })))
                .await
                .unwrap();
        }
        let listed = store.list("users/u1/sessions/s1/messages").await.unwrap();
        let order: Vec<_> = listed.iter().map(|d| d.data["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert!(listed.windows(2).all(|w| w[0].create_time < w[1].create_time));
    }

    #[tokio::test]
    async fn create_if_absent_only_succeeds_once() {
        let store = store();
        let path = "users/u1/sessions/s1";
        assert!(store.create_if_absent(path, fields(json!({"n": 1}))).await.unwrap());
        assert!(!store.create_if_absent(path, fields(json!({"n": 2}))).await.unwrap());
        let doc = store.get(path).await.unwrap().unwrap();
        assert_eq!(doc.data["n"], json!(1));
        assert_eq!(doc.id, "s1");
    }

    #[tokio::test]
    async fn merge_requires_an_existing_document() {
        let store = store();
        let err = store
            .merge("users/ghost", fields(json!({"status": "created"})))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));

        store
            .set("users/u1", fields(json!({"email": "a@b.c", "status": "creating"})))
            .await
            .unwrap();
        store
            .merge("users/u1", fields(json!({"status": "created"})))
            .await
            .unwrap();
        let doc = store.get("users/u1").await.unwrap().unwrap();
        assert_eq!(doc.data["status"], json!("created"));
        assert_eq!(doc.data["email"], json!("a@b.c"));
    }

    #[tokio::test]
    async fn change_feed_reports_written_paths() {
        let store = store();
        let mut feed = store.changes().await.unwrap();
        store.set("users/u1", fields(json!({}))).await.unwrap();
        assert_eq!(feed.next().await, Some(Change::Path("users/u1".into())));
    }
}
