use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::CachePolicy;

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub session: SessionConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
    }
  }
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

/// Freshness windows for one resource kind.
///
/// A missing or `null` value means "never" (never stale, never evicted).
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct FreshnessConfig {
  pub stale_secs: Option<u64>,
  pub expire_secs: Option<u64>,
}

impl FreshnessConfig {
  const fn new(stale_secs: Option<u64>, expire_secs: Option<u64>) -> Self {
    Self {
      stale_secs,
      expire_secs,
    }
  }

  pub fn policy(&self) -> CachePolicy {
    CachePolicy::new(
      self.stale_secs.map(seconds),
      self.expire_secs.map(seconds),
    )
  }
}

fn seconds(secs: u64) -> Duration {
  i64::try_from(secs)
    .ok()
    .and_then(Duration::try_seconds)
    .unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Disable to send every read to the network
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// The post collection
  #[serde(default = "default_posts_freshness")]
  pub posts: FreshnessConfig,
  /// Single posts
  #[serde(default = "default_post_freshness")]
  pub post: FreshnessConfig,
  /// Users (authors)
  #[serde(default = "default_user_freshness")]
  pub user: FreshnessConfig,
  /// Comments of one post
  #[serde(default = "default_comments_freshness")]
  pub comments: FreshnessConfig,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      posts: default_posts_freshness(),
      post: default_post_freshness(),
      user: default_user_freshness(),
      comments: default_comments_freshness(),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_posts_freshness() -> FreshnessConfig {
  FreshnessConfig::new(Some(60), Some(5 * 60))
}

fn default_post_freshness() -> FreshnessConfig {
  FreshnessConfig::new(Some(5 * 60), Some(15 * 60))
}

fn default_user_freshness() -> FreshnessConfig {
  FreshnessConfig::new(None, Some(24 * 60 * 60))
}

fn default_comments_freshness() -> FreshnessConfig {
  FreshnessConfig::new(Some(30), Some(5 * 60))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// Session name; locally added posts are scoped to it
  pub name: Option<String>,
  /// Sessions untouched for this long have ended and are wiped on startup
  #[serde(default = "default_idle_timeout")]
  pub idle_timeout_minutes: u64,
  /// Keep locally added posts in memory only
  #[serde(default)]
  pub ephemeral: bool,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      name: None,
      idle_timeout_minutes: default_idle_timeout(),
      ephemeral: false,
    }
  }
}

impl SessionConfig {
  pub fn name(&self) -> &str {
    self.name.as_deref().unwrap_or(DEFAULT_SESSION)
  }

  pub fn idle_timeout(&self) -> Duration {
    i64::try_from(self.idle_timeout_minutes)
      .ok()
      .and_then(Duration::try_minutes)
      .unwrap_or(Duration::MAX)
  }
}

fn default_idle_timeout() -> u64 {
  12 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter directive, overridden by RUST_LOG
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Log file path (default: $XDG_DATA_HOME/postdeck/postdeck.log)
  pub file: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      file: None,
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./postdeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/postdeck/config.yaml
  ///
  /// Without any file the built-in defaults are used. Environment overrides
  /// (`POSTDECK_BASE_URL`, `POSTDECK_SESSION`) are applied last.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("postdeck.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("postdeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(url) = lookup("POSTDECK_BASE_URL").filter(|v| !v.is_empty()) {
      self.api.base_url = url;
    }
    if let Some(session) = lookup("POSTDECK_SESSION").filter(|v| !v.is_empty()) {
      self.session.name = Some(session);
    }
    self
  }

  /// Directory for the session database and log file.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("postdeck"))
  }

  /// Header title: configured title or the API host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.api.base_url)
      .ok()
      .and_then(|u| u.host_str().map(String::from))
      .unwrap_or_else(|| self.api.base_url.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
    assert!(config.cache.enabled);
    assert_eq!(config.cache.user.stale_secs, None);
    assert_eq!(config.session.name(), DEFAULT_SESSION);
    assert_eq!(config.session.idle_timeout_minutes, 720);
  }

  #[test]
  fn test_partial_config() {
    let config = Config::parse(
      r#"
api:
  base_url: http://localhost:3000
title: Local posts
cache:
  comments:
    stale_secs: 5
    expire_secs: 10
session:
  name: review
  ephemeral: true
"#,
    )
    .unwrap();

    assert_eq!(config.api.base_url, "http://localhost:3000");
    assert_eq!(config.cache.comments, FreshnessConfig::new(Some(5), Some(10)));
    assert_eq!(config.cache.posts, default_posts_freshness());
    assert_eq!(config.session.name(), "review");
    assert!(config.session.ephemeral);
    assert_eq!(config.display_title(), "Local posts");
  }

  #[test]
  fn test_null_stale_means_never() {
    let config = Config::parse("cache:\n  posts:\n    stale_secs: null\n").unwrap();
    let policy = config.cache.posts.policy();
    assert_eq!(policy.stale_time, None);
    assert_eq!(policy.expire_time, None);
  }

  #[test]
  fn test_env_overrides() {
    let config = Config::default().with_env_overrides(|name| match name {
      "POSTDECK_BASE_URL" => Some("http://127.0.0.1:8080".to_string()),
      "POSTDECK_SESSION" => Some(String::new()),
      _ => None,
    });
    assert_eq!(config.api.base_url, "http://127.0.0.1:8080");
    assert_eq!(config.session.name(), DEFAULT_SESSION);
  }

  #[test]
  fn test_display_title_defaults_to_host() {
    let config = Config::default();
    assert_eq!(config.display_title(), "jsonplaceholder.typicode.com");
  }
}
