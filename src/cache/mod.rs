//! Generic in-memory query cache with request coalescing.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Stores fetched values under structured query keys
//! - Applies a stale/expire policy per key kind
//! - Serves stale data while a single background refresh runs
//! - Shares one in-flight fetch between all concurrent requesters of a key
//! - Seeds per-item entries when a collection is fetched

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, MemoryStorage, NoopStorage};
pub use traits::{CachePolicy, CacheResult, CacheSource, Cacheable, QueryKey};
