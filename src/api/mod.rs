//! Remote posts API: typed entities, the HTTP client, and its cached wrapper.

pub mod cached_client;
pub mod client;
pub mod error;
pub mod keys;
pub mod types;

pub use cached_client::CachedPostsClient;
pub use client::ApiClient;
pub use error::ApiError;
pub use keys::CacheKey;
pub use types::{Comment, Post, User};
