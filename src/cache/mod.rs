//! Local entity cache: the SQLite store, the writes that keep its relations
//! consistent, and the cache-or-fetch resolver on top.
//!
//! - Tasks, messages and users are stored as normalized rows
//! - Parents reference ordered children through comma-joined id-lists
//! - A summary row and its detail row always agree on their shared fields
//! - Reads are served from the store; a miss fetches, stores, then returns

pub mod idlist;
mod layer;
mod relations;
mod rows;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{EntityStore, Violation, MESSAGE_LIST, TASK_LIST};
pub use traits::{CacheResult, CacheSource, Cacheable};
