//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::realtime::RealtimeGateway;
use crate::web::session::SessionCookies;
use companion_core::ports::{Orchestrator, RelationalStore};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn RelationalStore>,
    pub realtime: RealtimeGateway,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub cookies: SessionCookies,
}
