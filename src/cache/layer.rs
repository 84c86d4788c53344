//! Cache layer that resolves reads from the store or the remote source.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use super::storage::EntityStore;
use super::traits::{CacheResult, Cacheable};
use crate::error::Result;

type Registry = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Cache-or-fetch resolver.
///
/// A cached value is returned without contacting the remote source. On a
/// miss the fetched value is stored before it is returned, and a failed
/// fetch leaves the store untouched. Concurrent misses for the same key
/// are coalesced: one caller fetches while the others wait and then read
/// what it stored.
#[derive(Clone)]
pub struct CacheLayer {
  store: Arc<EntityStore>,
  in_flight: Arc<Registry>,
}

impl CacheLayer {
  pub fn new(store: Arc<EntityStore>) -> Self {
    Self {
      store,
      in_flight: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn store(&self) -> &Arc<EntityStore> {
    &self.store
  }

  /// Return the cached value for `key`, fetching and storing it on a miss.
  pub async fn fetch_one<T, F, Fut>(&self, key: T::Key, fetcher: F) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    if let Some(cached) = T::load(&self.store, key)? {
      return Ok(CacheResult::from_cache(cached));
    }

    let flight_key = format!("{}:{:?}", T::entity_type(), key);
    let _flight = self.join_flight(flight_key).await;

    // Whoever held the flight before us may have stored it.
    if let Some(cached) = T::load(&self.store, key)? {
      debug!(entity = T::entity_type(), ?key, "served by coalesced fetch");
      return Ok(CacheResult::from_cache(cached));
    }

    debug!(entity = T::entity_type(), ?key, "cache miss, fetching");
    let data = fetcher().await?;
    data.save(&self.store)?;
    Ok(CacheResult::from_network(data))
  }

  /// Always fetch, then replace the cached value.
  pub async fn refresh<T, F, Fut>(&self, fetcher: F) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let data = fetcher().await?;
    data.save(&self.store)?;
    debug!(entity = T::entity_type(), "refreshed");
    Ok(CacheResult::from_network(data))
  }

  async fn join_flight(&self, key: String) -> Flight {
    let lock = {
      let mut map = match self.in_flight.lock() {
        Ok(map) => map,
        Err(poisoned) => poisoned.into_inner(),
      };
      map.entry(key.clone()).or_default().clone()
    };
    let guard = lock.lock_owned().await;
    Flight {
      registry: Arc::clone(&self.in_flight),
      key,
      guard: Some(guard),
    }
  }
}

/// Holds a key's fetch slot; the registry entry goes away with the last holder.
struct Flight {
  registry: Arc<Registry>,
  key: String,
  guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Flight {
  fn drop(&mut self) {
    let Some(guard) = self.guard.take() else {
      return;
    };
    let mut map = match self.registry.lock() {
      Ok(map) => map,
      Err(poisoned) => poisoned.into_inner(),
    };
    // One reference in the map and one in our guard: nobody is waiting.
    if Arc::strong_count(OwnedMutexGuard::mutex(&guard)) == 2 {
      map.remove(&self.key);
    }
    drop(map);
    drop(guard);
  }
}
