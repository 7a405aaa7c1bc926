use thiserror::Error;

/// Errors raised by the session storage and the local post store.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The persisted slot could not be parsed. Recovered as an empty set.
  #[error("persisted local posts are malformed: {0}")]
  MalformedPersistedState(String),
  /// A local post with this id already exists
  #[error("a post with id {0} already exists")]
  DuplicateId(u64),
  /// The storage backend failed to read or write
  #[error("session storage error: {0}")]
  Storage(String),
}

impl From<rusqlite::Error> for StoreError {
  fn from(err: rusqlite::Error) -> Self {
    StoreError::Storage(err.to_string())
  }
}
