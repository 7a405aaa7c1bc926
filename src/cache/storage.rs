//! Cache storage trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::traits::{CacheEntry, QueryKey};

/// Trait for cache storage backends.
pub trait CacheStorage<K: QueryKey>: Send + Sync + 'static {
  /// Get the entry stored under `key`.
  fn get(&self, key: &K) -> Option<CacheEntry>;

  /// Store (or replace) the entry under `key`.
  fn put(&self, key: K, entry: CacheEntry);

  /// Drop the entry under `key`.
  fn remove(&self, key: &K);
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl<K: QueryKey> CacheStorage<K> for NoopStorage {
  fn get(&self, _key: &K) -> Option<CacheEntry> {
    None // Always miss
  }

  fn put(&self, _key: K, _entry: CacheEntry) {}

  fn remove(&self, _key: &K) {}
}

/// Session-lifetime storage backed by a hash map.
pub struct MemoryStorage<K> {
  entries: Mutex<HashMap<K, CacheEntry>>,
}

impl<K> MemoryStorage<K> {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
    }
  }
}

impl<K> Default for MemoryStorage<K> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K: QueryKey> CacheStorage<K> for MemoryStorage<K> {
  fn get(&self, key: &K) -> Option<CacheEntry> {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.get(key).cloned()
  }

  fn put(&self, key: K, entry: CacheEntry) {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.insert(key, entry);
  }

  fn remove(&self, key: &K) {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.remove(key);
  }
}

/// Lets the backend be chosen at runtime (memory or no-op).
impl<K: QueryKey> CacheStorage<K> for Box<dyn CacheStorage<K>> {
  fn get(&self, key: &K) -> Option<CacheEntry> {
    (**self).get(key)
  }

  fn put(&self, key: K, entry: CacheEntry) {
    (**self).put(key, entry)
  }

  fn remove(&self, key: &K) {
    (**self).remove(key)
  }
}
