//! Merging local and remote posts, search filtering, and new-post drafting.

use std::collections::HashSet;
use thiserror::Error;

use crate::api::Post;

pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_BODY_LEN: usize = 10;

/// Local posts first (in their order), then remote posts whose id is not
/// taken by a local post (in remote order). A local post always wins.
pub fn combine(local: &[Post], remote: &[Post]) -> Vec<Post> {
  let local_ids: HashSet<u64> = local.iter().map(|p| p.id).collect();

  local
    .iter()
    .chain(remote.iter().filter(|p| !local_ids.contains(&p.id)))
    .cloned()
    .collect()
}

/// Keep posts whose title contains `term`, ignoring case. A blank term keeps
/// everything.
pub fn filter(posts: &[Post], term: &str) -> Vec<Post> {
  let term = term.trim().to_lowercase();
  if term.is_empty() {
    return posts.to_vec();
  }

  posts
    .iter()
    .filter(|p| p.title.to_lowercase().contains(&term))
    .cloned()
    .collect()
}

/// One greater than the largest id across both sets, or 1 when both are empty.
///
/// `None` when the largest id is already `u64::MAX`.
pub fn next_id(local: &[Post], remote: &[Post]) -> Option<u64> {
  match local.iter().chain(remote).map(|p| p.id).max() {
    Some(max) => max.checked_add(1),
    None => Some(1),
  }
}

/// Why a draft cannot become a post
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
  #[error("title must be at least 3 characters")]
  TitleTooShort,
  #[error("description must be at least 10 characters")]
  BodyTooShort,
  #[error("user id must be a positive number")]
  InvalidUserId,
  #[error("no post ids left to assign")]
  IdsExhausted,
}

/// User input for a new local post
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
  pub title: String,
  pub user_id: u64,
  pub body: String,
}

impl PostDraft {
  /// Check the draft, reporting the first problem found.
  pub fn validate(&self) -> Result<(), DraftError> {
    if self.title.trim().chars().count() < MIN_TITLE_LEN {
      return Err(DraftError::TitleTooShort);
    }
    if self.user_id == 0 {
      return Err(DraftError::InvalidUserId);
    }
    if self.body.trim().chars().count() < MIN_BODY_LEN {
      return Err(DraftError::BodyTooShort);
    }
    Ok(())
  }

  pub fn into_post(self, id: u64) -> Post {
    Post {
      id,
      user_id: self.user_id,
      title: self.title.trim().to_string(),
      body: self.body.trim().to_string(),
    }
  }
}

/// Validate `draft` and give it the next free id.
pub fn compose(draft: PostDraft, local: &[Post], remote: &[Post]) -> Result<Post, DraftError> {
  draft.validate()?;
  let id = next_id(local, remote).ok_or(DraftError::IdsExhausted)?;
  Ok(draft.into_post(id))
}
