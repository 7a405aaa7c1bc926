//! Cache layer that orchestrates caching logic with network fetching.

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::{CachePolicy, CacheResult, Cacheable, QueryKey};
use crate::api::ApiError;

/// A fetch shared by every requester of the same key.
type SharedFetch = Shared<BoxFuture<'static, Result<Value, ApiError>>>;

struct InFlight {
  id: u64,
  fetch: SharedFetch,
}

#[derive(Clone, Default)]
struct Policies {
  by_kind: HashMap<&'static str, CachePolicy>,
  fallback: CachePolicy,
}

impl Policies {
  fn for_key<K: QueryKey>(&self, key: &K) -> CachePolicy {
    self
      .by_kind
      .get(key.kind())
      .copied()
      .unwrap_or(self.fallback)
  }
}

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the application and the network client,
/// providing transparent caching and request coalescing. At most one fetch
/// per key is in flight at any time; all concurrent requesters await the
/// same shared future and receive the same value or the same error.
pub struct CacheLayer<K: QueryKey, S: CacheStorage<K>> {
  storage: Arc<S>,
  in_flight: Arc<Mutex<HashMap<K, InFlight>>>,
  policies: Arc<Policies>,
  next_fetch_id: Arc<AtomicU64>,
}

impl<K: QueryKey, S: CacheStorage<K>> CacheLayer<K, S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      in_flight: Arc::new(Mutex::new(HashMap::new())),
      policies: Arc::new(Policies::default()),
      next_fetch_id: Arc::new(AtomicU64::new(0)),
    }
  }

  /// Set the freshness policy for one resource kind.
  pub fn with_policy(mut self, kind: &'static str, policy: CachePolicy) -> Self {
    Arc::make_mut(&mut self.policies)
      .by_kind
      .insert(kind, policy);
    self
  }

  /// Fetch a single value with caching.
  ///
  /// 1. Fresh entry - return immediately, no fetch
  /// 2. Stale entry - return it and refresh in the background
  /// 3. Missing or expired - await the (shared) fetch
  pub async fn fetch_one<T, F, Fut>(&self, key: K, fetcher: F) -> Result<CacheResult<T>, ApiError>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    self.fetch_with(key, fetcher, |_: &T| Vec::new()).await
  }

  /// Fetch a collection with caching.
  ///
  /// Same policy as [`fetch_one`](Self::fetch_one). A successful network
  /// fetch also stores every item under its own key, so a later single-item
  /// lookup is answered from the cache.
  pub async fn fetch_list<T, F, Fut>(
    &self,
    key: K,
    fetcher: F,
  ) -> Result<CacheResult<Vec<T>>, ApiError>
  where
    T: Cacheable<Key = K>,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, ApiError>> + Send + 'static,
  {
    self
      .fetch_with(key, fetcher, |items: &Vec<T>| {
        items
          .iter()
          .filter_map(|item| {
            serde_json::to_value(item)
              .ok()
              .map(|value| (item.cache_key(), value))
          })
          .collect()
      })
      .await
  }

  /// Drop the entry for `key` so the next request goes to the network.
  ///
  /// A fetch already in flight for `key` is detached: its waiters still get
  /// its result, but it no longer writes to storage and new requests start a
  /// fresh fetch.
  pub fn invalidate(&self, key: &K) {
    debug!(key = %key, "invalidating cache entry");
    self.storage.remove(key);
    let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
    if in_flight.remove(key).is_some() {
      debug!(key = %key, "detached in-flight fetch");
    }
  }

  async fn fetch_with<T, F, Fut, D>(
    &self,
    key: K,
    fetcher: F,
    derive: D,
  ) -> Result<CacheResult<T>, ApiError>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    D: FnOnce(&T) -> Vec<(K, Value)> + Send + 'static,
  {
    let now = Utc::now();

    // Check cache first
    if let Some(entry) = self.storage.get(&key) {
      if entry.is_expired(now) {
        debug!(key = %key, "cache entry expired");
        self.storage.remove(&key);
      } else {
        let stale = entry.is_stale(now);
        let fetched_at = entry.fetched_at;

        match serde_json::from_value::<T>(entry.data) {
          Ok(data) => {
            if stale {
              debug!(key = %key, "serving stale entry, refreshing in background");
              let refresh = self.start_or_join(key.clone(), fetcher, derive);
              tokio::spawn(async move {
                // Failures are logged by the fetch itself; the stale entry stays
                let _ = refresh.await;
              });
            } else {
              debug!(key = %key, "cache hit");
            }
            return Ok(CacheResult::from_cache(data, fetched_at, stale));
          }
          Err(e) => {
            warn!(key = %key, error = %e, "dropping undecodable cache entry");
            self.storage.remove(&key);
          }
        }
      }
    }

    // No usable entry, must wait for the network
    let value = self.start_or_join(key.clone(), fetcher, derive).await?;
    let data = decode(&key, value)?;
    Ok(CacheResult::from_network(data))
  }

  /// Return the in-flight fetch for `key`, starting one if there is none.
  fn start_or_join<T, F, Fut, D>(&self, key: K, fetcher: F, derive: D) -> SharedFetch
  where
    T: Serialize + Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    D: FnOnce(&T) -> Vec<(K, Value)> + Send + 'static,
  {
    let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(pending) = in_flight.get(&key) {
      debug!(key = %key, "joining in-flight fetch");
      return pending.fetch.clone();
    }

    let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
    let storage = Arc::clone(&self.storage);
    let registry = Arc::clone(&self.in_flight);
    let policies = Arc::clone(&self.policies);
    let task_key = key.clone();

    let fetch = async move {
      debug!(key = %task_key, "fetching from network");

      let outcome = match fetcher().await {
        Ok(data) => serde_json::to_value(&data)
          .map(|value| (value, derive(&data)))
          .map_err(|e| ApiError::Decode {
            resource: task_key.to_string(),
            message: e.to_string(),
          }),
        Err(e) => Err(e),
      };

      // Only the fetch still registered for the key may write; an
      // invalidation during the request detached this one.
      let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
      let current = registry.get(&task_key).is_some_and(|pending| pending.id == id);
      if current {
        registry.remove(&task_key);
      }

      match outcome {
        Ok((value, derived)) if current => {
          let now = Utc::now();
          storage.put(
            task_key.clone(),
            policies.for_key(&task_key).entry(value.clone(), now),
          );
          if !derived.is_empty() {
            debug!(key = %task_key, items = derived.len(), "seeding item entries");
          }
          for (item_key, item) in derived {
            let entry = policies.for_key(&item_key).entry(item, now);
            storage.put(item_key, entry);
          }
          Ok(value)
        }
        Ok((value, _)) => {
          debug!(key = %task_key, "discarding result of detached fetch");
          Ok(value)
        }
        Err(e) => {
          warn!(key = %task_key, error = %e, "fetch failed");
          Err(e)
        }
      }
    }
    .boxed()
    .shared();

    in_flight.insert(
      key,
      InFlight {
        id,
        fetch: fetch.clone(),
      },
    );
    fetch
  }
}

impl<K: QueryKey, S: CacheStorage<K>> Clone for CacheLayer<K, S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      in_flight: Arc::clone(&self.in_flight),
      policies: Arc::clone(&self.policies),
      next_fetch_id: Arc::clone(&self.next_fetch_id),
    }
  }
}

fn decode<K: QueryKey, T: DeserializeOwned>(key: &K, value: Value) -> Result<T, ApiError> {
  serde_json::from_value(value).map_err(|e| ApiError::Decode {
    resource: key.to_string(),
    message: e.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, MemoryStorage, NoopStorage};
  use chrono::Duration;
  use serde::Deserialize;
  use std::fmt;
  use std::sync::atomic::AtomicUsize;

  #[derive(Debug, Clone, PartialEq, Eq, Hash)]
  enum TestKey {
    Items,
    Item(u64),
  }

  impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
        TestKey::Items => write!(f, "items"),
        TestKey::Item(id) => write!(f, "items/{}", id),
      }
    }
  }

  impl QueryKey for TestKey {
    fn kind(&self) -> &'static str {
      match self {
        TestKey::Items => "items",
        TestKey::Item(_) => "item",
      }
    }
  }

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: u64,
    name: String,
  }

  impl Cacheable for Item {
    type Key = TestKey;

    fn cache_key(&self) -> TestKey {
      TestKey::Item(self.id)
    }
  }

  fn item(id: u64) -> Item {
    Item {
      id,
      name: format!("item {}", id),
    }
  }

  fn fresh_layer() -> CacheLayer<TestKey, MemoryStorage<TestKey>> {
    CacheLayer::new(MemoryStorage::new())
      .with_policy(
        "items",
        CachePolicy::new(Some(Duration::minutes(1)), Some(Duration::minutes(5))),
      )
      .with_policy(
        "item",
        CachePolicy::new(Some(Duration::minutes(5)), Some(Duration::minutes(15))),
      )
  }

  /// Fetcher that counts invocations and yields once before answering
  fn counting<T: Clone + Send + 'static>(
    calls: &Arc<AtomicUsize>,
    value: T,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<T, ApiError>> + Send + 'static {
    let calls = Arc::clone(calls);
    move || {
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(value)
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_fresh_entry_skips_network() {
    let cache = fresh_layer();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = cache
      .fetch_one(TestKey::Item(1), counting(&calls, item(1)))
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = cache
      .fetch_one(TestKey::Item(1), counting(&calls, item(99)))
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(second.data, item(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_concurrent_requests_are_coalesced() {
    let cache = fresh_layer();
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b, c) = tokio::join!(
      cache.fetch_one(TestKey::Item(7), counting(&calls, item(7))),
      cache.fetch_one(TestKey::Item(7), counting(&calls, item(7))),
      cache.fetch_one(TestKey::Item(7), counting(&calls, item(7))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap().data, item(7));
    assert_eq!(b.unwrap().data, item(7));
    assert_eq!(c.unwrap().data, item(7));
  }

  #[tokio::test]
  async fn test_error_reaches_every_waiter_and_is_not_cached() {
    let cache = fresh_layer();
    let calls = Arc::new(AtomicUsize::new(0));

    let failing = |calls: &Arc<AtomicUsize>| {
      let calls = Arc::clone(calls);
      move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Err::<Item, _>(ApiError::Transport("connection refused".to_string()))
      }
    };

    let (a, b) = tokio::join!(
      cache.fetch_one(TestKey::Item(3), failing(&calls)),
      cache.fetch_one(TestKey::Item(3), failing(&calls)),
    );
    let expected = ApiError::Transport("connection refused".to_string());
    assert_eq!(a.unwrap_err(), expected);
    assert_eq!(b.unwrap_err(), expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Explicit retry goes back to the network
    let retried = cache
      .fetch_one(TestKey::Item(3), counting(&calls, item(3)))
      .await
      .unwrap();
    assert_eq!(retried.source, CacheSource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_stale_entry_served_while_refreshing() {
    let cache: CacheLayer<TestKey, _> = CacheLayer::new(MemoryStorage::new()).with_policy(
      "item",
      CachePolicy::new(Some(Duration::zero()), Some(Duration::minutes(5))),
    );
    let calls = Arc::new(AtomicUsize::new(0));

    cache
      .fetch_one(TestKey::Item(1), counting(&calls, item(1)))
      .await
      .unwrap();

    let updated = Item {
      id: 1,
      name: "renamed".to_string(),
    };
    let stale = cache
      .fetch_one(TestKey::Item(1), counting(&calls, updated.clone()))
      .await
      .unwrap();
    assert_eq!(stale.source, CacheSource::CacheStale);
    assert_eq!(stale.data, item(1));

    // Let the background refresh land
    tokio::time::sleep(std::time::Duration::from_millis(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let refreshed = cache
      .fetch_one(TestKey::Item(1), counting(&calls, item(5)))
      .await
      .unwrap();
    assert_eq!(refreshed.data, updated);
  }

  #[tokio::test]
  async fn test_expired_entry_is_refetched() {
    let cache: CacheLayer<TestKey, _> = CacheLayer::new(MemoryStorage::new()).with_policy(
      "item",
      CachePolicy::new(Some(Duration::zero()), Some(Duration::zero())),
    );
    let calls = Arc::new(AtomicUsize::new(0));

    cache
      .fetch_one(TestKey::Item(1), counting(&calls, item(1)))
      .await
      .unwrap();
    let again = cache
      .fetch_one(TestKey::Item(1), counting(&calls, item(1)))
      .await
      .unwrap();

    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_never_stale_policy_serves_cache() {
    let cache: CacheLayer<TestKey, _> =
      CacheLayer::new(MemoryStorage::new()).with_policy("item", CachePolicy::new(None, None));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
      cache
        .fetch_one(TestKey::Item(2), counting(&calls, item(2)))
        .await
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_list_fetch_seeds_item_entries() {
    let cache = fresh_layer();
    let calls = Arc::new(AtomicUsize::new(0));

    let list = cache
      .fetch_list(TestKey::Items, counting(&calls, vec![item(1), item(2)]))
      .await
      .unwrap();
    assert_eq!(list.data.len(), 2);

    let single = cache
      .fetch_one(TestKey::Item(2), counting(&calls, item(42)))
      .await
      .unwrap();
    assert_eq!(single.source, CacheSource::CacheFresh);
    assert_eq!(single.data, item(2));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_invalidate_forces_network() {
    let cache = fresh_layer();
    let calls = Arc::new(AtomicUsize::new(0));

    cache
      .fetch_one(TestKey::Item(1), counting(&calls, item(1)))
      .await
      .unwrap();
    cache.invalidate(&TestKey::Item(1));
    let again = cache
      .fetch_one(TestKey::Item(1), counting(&calls, item(1)))
      .await
      .unwrap();

    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalidate_detaches_pending_fetch() {
    let cache = fresh_layer();
    let calls = Arc::new(AtomicUsize::new(0));
    let renamed = |name: &str| Item {
      id: 3,
      name: name.to_string(),
    };

    let pending = {
      let cache = cache.clone();
      let fetcher = counting(&calls, renamed("before"));
      tokio::spawn(async move { cache.fetch_one(TestKey::Item(3), fetcher).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache.invalidate(&TestKey::Item(3));
    let fresh = cache
      .fetch_one(TestKey::Item(3), counting(&calls, renamed("after")))
      .await
      .unwrap();
    assert_eq!(fresh.source, CacheSource::Network);
    assert_eq!(fresh.data.name, "after");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // The detached fetch still answers its own waiter but left no entry behind
    assert_eq!(pending.await.unwrap().unwrap().data.name, "before");
    let cached = cache
      .fetch_one(TestKey::Item(3), counting(&calls, renamed("unused")))
      .await
      .unwrap();
    assert_eq!(cached.source, CacheSource::CacheFresh);
    assert_eq!(cached.data.name, "after");
  }

  #[tokio::test]
  async fn test_noop_storage_still_coalesces() {
    let cache: CacheLayer<TestKey, NoopStorage> = CacheLayer::new(NoopStorage);
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
      cache.fetch_one(TestKey::Item(1), counting(&calls, item(1))),
      cache.fetch_one(TestKey::Item(1), counting(&calls, item(1))),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache
      .fetch_one(TestKey::Item(1), counting(&calls, item(1)))
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
