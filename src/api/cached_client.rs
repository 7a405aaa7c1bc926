//! Posts client with transparent caching and request coalescing.

use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheLayer, CacheResult, CacheSource, CacheStorage, MemoryStorage, NoopStorage};
use crate::config::CacheConfig;

use super::client::PostsApi;
use super::error::ApiError;
use super::keys::CacheKey;
use super::types::{Comment, Post, User};

type DynStorage = Box<dyn CacheStorage<CacheKey>>;

/// Posts client with transparent caching support.
///
/// This wraps any [`PostsApi`] and provides the same read operations, but
/// answers from the cache while entries are fresh and shares one network
/// request between concurrent callers of the same resource.
#[derive(Clone)]
pub struct CachedPostsClient {
  inner: Arc<dyn PostsApi>,
  cache: CacheLayer<CacheKey, DynStorage>,
}

impl CachedPostsClient {
  /// Create a new cached client.
  pub fn new(inner: Arc<dyn PostsApi>, config: &CacheConfig) -> Self {
    let storage: DynStorage = if config.enabled {
      Box::new(MemoryStorage::new())
    } else {
      Box::new(NoopStorage)
    };

    let cache = CacheKey::policies(config)
      .into_iter()
      .fold(CacheLayer::new(storage), |cache, (kind, policy)| {
        cache.with_policy(kind, policy)
      });

    Self { inner, cache }
  }

  /// Get all remote posts. Also primes the single-post entries.
  pub async fn posts(&self) -> Result<Vec<Post>, ApiError> {
    let inner = Arc::clone(&self.inner);
    let result = self
      .cache
      .fetch_list(CacheKey::Posts, move || async move { inner.posts().await })
      .await?;

    Ok(served(result))
  }

  /// Get a single remote post by id.
  pub async fn post(&self, id: u64) -> Result<Post, ApiError> {
    let inner = Arc::clone(&self.inner);
    let result = self
      .cache
      .fetch_one(CacheKey::Post { id }, move || async move {
        inner.post(id).await
      })
      .await?;

    Ok(served(result))
  }

  /// Get a user by id.
  pub async fn user(&self, id: u64) -> Result<User, ApiError> {
    let inner = Arc::clone(&self.inner);
    let result = self
      .cache
      .fetch_one(CacheKey::User { id }, move || async move {
        inner.user(id).await
      })
      .await?;

    Ok(served(result))
  }

  /// Get the comments attached to a post.
  pub async fn comments(&self, post_id: u64) -> Result<Vec<Comment>, ApiError> {
    let inner = Arc::clone(&self.inner);
    let result = self
      .cache
      .fetch_one(CacheKey::Comments { post_id }, move || async move {
        inner.comments(post_id).await
      })
      .await?;

    Ok(served(result))
  }

  /// Drop a cached resource so the next read goes to the network.
  pub fn invalidate(&self, key: &CacheKey) {
    self.cache.invalidate(key);
  }
}

fn served<T>(result: CacheResult<T>) -> T {
  if let (CacheSource::CacheStale, Some(cached_at)) = (result.source, result.cached_at) {
    debug!(%cached_at, "answered from stale cache entry");
  }
  result.data
}
