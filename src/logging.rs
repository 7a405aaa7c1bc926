use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogConfig};

const LOG_FILE: &str = "postdeck.log";

/// Install the global subscriber, writing to a log file since the terminal
/// belongs to the UI.
///
/// `RUST_LOG` takes precedence over the configured level. Keep the returned
/// guard alive until exit so buffered lines are flushed.
pub fn init(config: &LogConfig) -> Result<WorkerGuard> {
  let path = match &config.file {
    Some(path) => path.clone(),
    None => Config::data_dir()?.join(LOG_FILE),
  };
  let (dir, file_name) = split_path(&path)?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(&dir, &file_name);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let env_filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&config.level))
    .map_err(|e| eyre!("Invalid log level {:?}: {}", config.level, e))?;

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

fn split_path(path: &std::path::Path) -> Result<(PathBuf, String)> {
  let file_name = path
    .file_name()
    .and_then(|n| n.to_str())
    .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?
    .to_string();
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  };
  Ok((dir, file_name))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;

  #[test]
  fn test_split_path() {
    let (dir, name) = split_path(Path::new("/tmp/postdeck/debug.log")).unwrap();
    assert_eq!(dir, PathBuf::from("/tmp/postdeck"));
    assert_eq!(name, "debug.log");

    let (dir, name) = split_path(Path::new("postdeck.log")).unwrap();
    assert_eq!(dir, PathBuf::from("."));
    assert_eq!(name, "postdeck.log");

    assert!(split_path(Path::new("/")).is_err());
  }
}
