//! services/api/src/lib.rs
//!
//! The HTTP service of the companion backend: store adapters, the realtime
//! gateway, and the axum web layer. The binaries in `src/bin` wire them up.

pub mod adapters;
pub mod config;
pub mod error;
pub mod realtime;
pub mod web;
