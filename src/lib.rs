//! Local-first cache for a task and messaging REST backend.
//!
//! [`api::CachedClient`] is the entry point: it answers reads from the
//! SQLite [`cache::EntityStore`] when it can, fetches through
//! [`api::RemoteSource`] when it must, and renews an expired login
//! transparently through [`auth::AuthGuard`].

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod state;

pub use error::{Result, SyncError};
