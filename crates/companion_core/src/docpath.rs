//! crates/companion_core/src/docpath.rs
//!
//! Document-store path layout:
//! `users/{uid}`, `users/{uid}/sessions/{sid}`, `users/{uid}/sessions/{sid}/messages/{mid}`.

use crate::ports::{PortError, PortResult};

fn segment(value: &str) -> PortResult<&str> {
    if value.is_empty() || value.contains('/') {
        return Err(PortError::InvalidInput(format!(
            "'{value}' is not a valid document id"
        )));
    }
    Ok(value)
}

pub fn user_doc(uid: &str) -> PortResult<String> {
    Ok(format!("users/{}", segment(uid)?))
}

pub fn session_doc(uid: &str, session_id: &str) -> PortResult<String> {
    Ok(format!("{}/sessions/{}", user_doc(uid)?, segment(session_id)?))
}

pub fn messages_collection(uid: &str, session_id: &str) -> PortResult<String> {
    Ok(format!("{}/messages", session_doc(uid, session_id)?))
}

/// Joins a collection path and a document id.
pub fn child(collection: &str, id: &str) -> PortResult<String> {
    Ok(format!("{collection}/{}", segment(id)?))
}

/// The collection a document lives in (`a/b/c/d` → `a/b/c`).
pub fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// The last segment of a path.
pub fn id_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, id)| id).unwrap_or(path)
}
