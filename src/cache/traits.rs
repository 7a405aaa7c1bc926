//! Core traits and types for the caching system.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::hash::Hash;

/// Structured cache key (resource kind plus optional identity).
pub trait QueryKey: Clone + Eq + Hash + Display + Send + Sync + 'static {
  /// Resource kind used to look up the freshness policy (e.g. "posts", "user")
  fn kind(&self) -> &'static str;
}

/// Trait for entities that get their own cache entry when they arrive as
/// part of a collection.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  type Key: QueryKey;

  /// Key under which a single instance of this entity is cached
  fn cache_key(&self) -> Self::Key;
}

/// Freshness windows for one resource kind. `None` means "never".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
  /// How long after fetching the entry is served without a refresh
  pub stale_time: Option<Duration>,
  /// How long after fetching the entry is dropped entirely
  pub expire_time: Option<Duration>,
}

impl CachePolicy {
  pub fn new(stale_time: Option<Duration>, expire_time: Option<Duration>) -> Self {
    Self {
      stale_time,
      expire_time,
    }
  }

  /// Build an entry for data fetched at `fetched_at` under this policy.
  pub fn entry(&self, data: serde_json::Value, fetched_at: DateTime<Utc>) -> CacheEntry {
    CacheEntry {
      data,
      fetched_at,
      // Windows too large to represent are treated as "never"
      stale_after: self
        .stale_time
        .and_then(|d| fetched_at.checked_add_signed(d)),
      expire_after: self
        .expire_time
        .and_then(|d| fetched_at.checked_add_signed(d)),
    }
  }
}

impl Default for CachePolicy {
  fn default() -> Self {
    Self {
      stale_time: Some(Duration::minutes(1)),
      expire_time: Some(Duration::minutes(5)),
    }
  }
}

/// A stored value with its freshness bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  /// Serialized value
  pub data: serde_json::Value,
  /// When the value arrived from the network
  pub fetched_at: DateTime<Utc>,
  /// From this instant on the value is stale (servable, but refreshed)
  pub stale_after: Option<DateTime<Utc>>,
  /// From this instant on the value is no longer served
  pub expire_after: Option<DateTime<Utc>>,
}

impl CacheEntry {
  pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
    self.stale_after.is_some_and(|t| now >= t)
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expire_after.is_some_and(|t| now >= t)
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Data from the network (possibly shared with other requesters)
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache past its freshness window; a refresh is in progress
  CacheStale,
}
