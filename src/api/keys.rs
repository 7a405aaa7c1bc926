//! Cache keys and freshness policies for posts API resources.

use std::fmt;

use crate::cache::{CachePolicy, Cacheable, QueryKey};
use crate::config::CacheConfig;

use super::types::Post;

/// Query key types for posts API calls.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
  /// The full post collection
  Posts,
  /// A single post
  Post { id: u64 },
  /// A single user (post author)
  User { id: u64 },
  /// Comments attached to a post
  Comments { post_id: u64 },
}

impl CacheKey {
  pub const POSTS: &'static str = "posts";
  pub const POST: &'static str = "post";
  pub const USER: &'static str = "user";
  pub const COMMENTS: &'static str = "comments";

  /// Per-kind freshness policies from configuration.
  pub fn policies(config: &CacheConfig) -> [(&'static str, CachePolicy); 4] {
    [
      (Self::POSTS, config.posts.policy()),
      (Self::POST, config.post.policy()),
      (Self::USER, config.user.policy()),
      (Self::COMMENTS, config.comments.policy()),
    ]
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Posts => write!(f, "posts"),
      Self::Post { id } => write!(f, "posts/{}", id),
      Self::User { id } => write!(f, "users/{}", id),
      Self::Comments { post_id } => write!(f, "posts/{}/comments", post_id),
    }
  }
}

impl QueryKey for CacheKey {
  fn kind(&self) -> &'static str {
    match self {
      Self::Posts => Self::POSTS,
      Self::Post { .. } => Self::POST,
      Self::User { .. } => Self::USER,
      Self::Comments { .. } => Self::COMMENTS,
    }
  }
}

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Post {
  type Key = CacheKey;

  fn cache_key(&self) -> CacheKey {
    CacheKey::Post { id: self.id }
  }
}
