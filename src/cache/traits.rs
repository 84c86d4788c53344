//! Core traits and types for the cache-or-fetch resolver.

use std::fmt::Debug;

use super::storage::EntityStore;
use crate::error::StoreError;

/// A value the resolver can look up in the store and persist after a fetch.
///
/// Implementors decide which store operation keeps their relations intact:
/// an aggregate replaces all of its rows in one transaction, a child is
/// linked into its parent's id-list.
pub trait Cacheable: Clone + Send + Sync + Sized {
  /// Lookup key (e.g., a task id, or `()` for a whole list)
  type Key: Copy + Debug + Send + Sync;

  /// Entity type name for logging and in-flight bookkeeping (e.g., "task")
  fn entity_type() -> &'static str;

  /// Read the cached value, or `None` on a miss.
  fn load(store: &EntityStore, key: Self::Key) -> Result<Option<Self>, StoreError>;

  /// Persist a value fresh from the network in place of whatever was cached.
  fn save(&self, store: &EntityStore) -> Result<(), StoreError>;
}

/// Result from a cache operation, with where the data came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }

  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Served from the local store without a remote call
  Cache,
  /// Fetched from the remote source and stored
  Network,
}
