use thiserror::Error;

/// Errors surfaced by the API client and the query cache.
///
/// Cloneable so a single failed fetch can be handed to every requester that
/// was waiting on the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// Network failure or non-success HTTP status
  #[error("{0}")]
  Transport(String),
  /// The requested entity does not exist
  #[error("{resource} not found")]
  NotFound { resource: String },
  /// The response body did not have the expected shape
  #[error("failed to decode {resource}: {message}")]
  Decode { resource: String, message: String },
}

impl ApiError {
  pub fn not_found(resource: impl Into<String>) -> Self {
    ApiError::NotFound {
      resource: resource.into(),
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::NotFound { .. })
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    ApiError::Transport(err.to_string())
  }
}
