use crate::api::error::ApiError;
use crate::api::types::{Comment, Post, User};
use crate::config::ApiConfig;
use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Read-only operations of the posts API.
///
/// The cache and the detail resolver only talk to this trait, so tests can
/// substitute an in-process fake.
#[async_trait]
pub trait PostsApi: Send + Sync {
  /// `GET /posts`
  async fn posts(&self) -> Result<Vec<Post>, ApiError>;

  /// `GET /posts/{id}`
  async fn post(&self, id: u64) -> Result<Post, ApiError>;

  /// `GET /users/{id}`
  async fn user(&self, id: u64) -> Result<User, ApiError>;

  /// `GET /posts/{id}/comments`
  async fn comments(&self, post_id: u64) -> Result<Vec<Comment>, ApiError>;
}

/// HTTP client for a JSONPlaceholder-compatible API
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = parse_base_url(&config.base_url)?;

    let http = reqwest::Client::builder()
      .user_agent(concat!("postdeck/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// GET `path` relative to the base URL and decode the JSON body.
  pub async fn fetch_resource<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    let url = endpoint(&self.base_url, path)?;
    debug!(%url, "GET");

    let response = self.http.get(url).send().await?;
    check_status(path, response.status())?;

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
      resource: path.to_string(),
      message: e.to_string(),
    })
  }
}

#[async_trait]
impl PostsApi for ApiClient {
  async fn posts(&self) -> Result<Vec<Post>, ApiError> {
    self.fetch_resource("posts").await
  }

  async fn post(&self, id: u64) -> Result<Post, ApiError> {
    self.fetch_resource(&format!("posts/{}", id)).await
  }

  async fn user(&self, id: u64) -> Result<User, ApiError> {
    self.fetch_resource(&format!("users/{}", id)).await
  }

  async fn comments(&self, post_id: u64) -> Result<Vec<Comment>, ApiError> {
    self
      .fetch_resource(&format!("posts/{}/comments", post_id))
      .await
  }
}

/// Parse the configured base URL, forcing a trailing slash so relative joins
/// keep any path prefix.
fn parse_base_url(raw: &str) -> Result<Url> {
  let normalized = if raw.ends_with('/') {
    raw.to_string()
  } else {
    format!("{}/", raw)
  };

  let url = Url::parse(&normalized).map_err(|e| eyre!("Invalid API base URL {}: {}", raw, e))?;
  if url.cannot_be_a_base() {
    return Err(eyre!("Invalid API base URL {}: not a base URL", raw));
  }
  Ok(url)
}

fn endpoint(base: &Url, path: &str) -> Result<Url, ApiError> {
  base
    .join(path.trim_start_matches('/'))
    .map_err(|e| ApiError::Transport(format!("invalid request path {}: {}", path, e)))
}

/// Map an HTTP status onto the error taxonomy.
fn check_status(path: &str, status: StatusCode) -> Result<(), ApiError> {
  if status == StatusCode::NOT_FOUND {
    return Err(ApiError::not_found(path));
  }
  if !status.is_success() {
    return Err(ApiError::Transport(format!(
      "GET {} failed with status {}",
      path, status
    )));
  }
  Ok(())
}
