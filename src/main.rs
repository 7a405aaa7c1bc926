mod api;
mod app;
mod cache;
mod commands;
mod config;
mod detail;
mod event;
mod logging;
mod posts;
mod query;
mod session;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::api::{ApiClient, CachedPostsClient};
use crate::config::Config;
use crate::session::{LocalPostStore, MemorySessionStorage, SessionStorage, SqliteSessionStorage};

const SESSION_DB: &str = "session.db";

#[derive(Parser, Debug)]
#[command(name = "postdeck")]
#[command(about = "Browse, search, and draft posts from a JSONPlaceholder-style API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/postdeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, overrides the config file
  #[arg(short, long)]
  base_url: Option<String>,

  /// Session name; locally added posts belong to it
  #[arg(short, long)]
  session: Option<String>,

  /// Discard the session's locally added posts and start fresh
  #[arg(long)]
  new_session: bool,
}

impl Args {
  fn apply(&self, mut config: Config) -> Config {
    if let Some(url) = &self.base_url {
      config.api.base_url = url.clone();
    }
    if let Some(session) = &self.session {
      config.session.name = Some(session.clone());
    }
    config
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = args.apply(Config::load(args.config.as_deref())?);

  let _log_guard = logging::init(&config.log)?;
  info!(
    version = env!("CARGO_PKG_VERSION"),
    session = config.session.name(),
    "starting postdeck"
  );

  let api = ApiClient::new(&config.api)?;
  info!(base_url = %api.base_url(), "api client ready");
  let client = CachedPostsClient::new(Arc::new(api), &config.cache);

  let storage = open_session_storage(&config, args.new_session)?;
  let store = LocalPostStore::open(storage);

  let mut app = app::App::new(&config, config.session.name().to_string(), client, store);
  app.run().await?;

  info!("exiting");
  Ok(())
}

/// Session storage for the configured session, emptied first on
/// `--new-session`.
fn open_session_storage(config: &Config, new_session: bool) -> Result<Box<dyn SessionStorage>> {
  let storage: Box<dyn SessionStorage> = if config.session.ephemeral {
    Box::new(MemorySessionStorage::new())
  } else {
    let path = Config::data_dir()?.join(SESSION_DB);
    let sqlite = SqliteSessionStorage::open(&path, config.session.name(), config.session.idle_timeout())?;
    info!(session = sqlite.session(), path = %path.display(), "session storage ready");
    Box::new(sqlite)
  };

  if new_session {
    storage.clear()?;
    info!(session = config.session.name(), "started a new session");
  }
  Ok(storage)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cli_overrides_config() {
    let args = Args::parse_from([
      "postdeck",
      "--base-url",
      "http://localhost:3000",
      "--session",
      "review",
      "--new-session",
    ]);
    let config = args.apply(Config::default());

    assert!(args.new_session);
    assert_eq!(config.api.base_url, "http://localhost:3000");
    assert_eq!(config.session.name(), "review");
  }
}
