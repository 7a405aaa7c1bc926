//! String-keyed session storage slots and their backends.

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use super::error::StoreError;

/// Key/value slots that live as long as one session.
pub trait SessionStorage: Send + Sync {
  /// Read a slot.
  fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

  /// Overwrite a slot.
  fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

  /// Delete a slot.
  fn remove_item(&self, key: &str) -> Result<(), StoreError>;

  /// Delete every slot of this session.
  fn clear(&self) -> Result<(), StoreError>;
}

/// Storage that lives and dies with the process.
#[derive(Default)]
pub struct MemorySessionStorage {
  slots: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SessionStorage for MemorySessionStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
    let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(slots.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    slots.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<(), StoreError> {
    let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    slots.remove(key);
    Ok(())
  }

  fn clear(&self) -> Result<(), StoreError> {
    let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    slots.clear();
    Ok(())
  }
}

/// SQLite-backed session storage.
///
/// Slots survive restarts under the same session name. A session whose slots
/// have not been written for longer than the idle timeout has ended; its rows
/// are deleted the next time any session opens the database.
pub struct SqliteSessionStorage {
  conn: Mutex<Connection>,
  session: String,
}

/// Schema for session tables.
const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session_storage (
    session TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (session, key)
);

CREATE INDEX IF NOT EXISTS idx_session_storage_updated
    ON session_storage(session, updated_at);
"#;

/// SQLite `datetime('now')` format
const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

impl SqliteSessionStorage {
  /// Open (or create) the database at `path` for `session`.
  pub fn open(path: &Path, session: &str, idle_timeout: Duration) -> Result<Self, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        StoreError::Storage(format!(
          "failed to create session directory {}: {}",
          parent.display(),
          e
        ))
      })?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch(SESSION_SCHEMA)?;

    let storage = Self {
      conn: Mutex::new(conn),
      session: session.to_string(),
    };

    let ended = storage.expire_idle_sessions(idle_timeout)?;
    if ended > 0 {
      info!(rows = ended, "removed slots of ended sessions");
    }
    storage.touch()?;
    debug!(session, path = %path.display(), "session storage opened");

    Ok(storage)
  }

  pub fn session(&self) -> &str {
    &self.session
  }

  /// Delete every session idle for longer than `idle_timeout`.
  fn expire_idle_sessions(&self, idle_timeout: Duration) -> Result<usize, StoreError> {
    let Some(cutoff) = Utc::now().checked_sub_signed(idle_timeout) else {
      return Ok(0);
    };
    let cutoff = cutoff.format(SQLITE_DATETIME).to_string();

    let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
    let removed = conn.execute(
      "DELETE FROM session_storage WHERE session IN (
         SELECT session FROM session_storage
         GROUP BY session
         HAVING MAX(updated_at) < ?
       )",
      params![cutoff],
    )?;
    Ok(removed)
  }

  /// Mark this session as active.
  fn touch(&self) -> Result<(), StoreError> {
    let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
    conn.execute(
      "UPDATE session_storage SET updated_at = datetime('now') WHERE session = ?",
      params![self.session],
    )?;
    Ok(())
  }
}

impl SessionStorage for SqliteSessionStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
    let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
    let value = conn
      .query_row(
        "SELECT value FROM session_storage WHERE session = ? AND key = ?",
        params![self.session, key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(value)
  }

  fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
    conn.execute(
      "INSERT OR REPLACE INTO session_storage (session, key, value, updated_at)
       VALUES (?, ?, ?, datetime('now'))",
      params![self.session, key, value],
    )?;
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<(), StoreError> {
    let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
    conn.execute(
      "DELETE FROM session_storage WHERE session = ? AND key = ?",
      params![self.session, key],
    )?;
    Ok(())
  }

  fn clear(&self) -> Result<(), StoreError> {
    let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
    conn.execute(
      "DELETE FROM session_storage WHERE session = ?",
      params![self.session],
    )?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn open(dir: &tempfile::TempDir, session: &str) -> SqliteSessionStorage {
    SqliteSessionStorage::open(&dir.path().join("session.db"), session, Duration::hours(12))
      .unwrap()
  }

  #[test]
  fn test_memory_storage_slots() {
    let storage = MemorySessionStorage::new();
    assert_eq!(storage.get_item("localPosts").unwrap(), None);

    storage.set_item("localPosts", "[]").unwrap();
    assert_eq!(storage.get_item("localPosts").unwrap().as_deref(), Some("[]"));

    storage.remove_item("localPosts").unwrap();
    assert_eq!(storage.get_item("localPosts").unwrap(), None);
  }

  #[test]
  fn test_sqlite_slot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    open(&dir, "default").set_item("localPosts", "[1]").unwrap();

    let reopened = open(&dir, "default");
    assert_eq!(reopened.get_item("localPosts").unwrap().as_deref(), Some("[1]"));
  }

  #[test]
  fn test_sqlite_sessions_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    open(&dir, "alpha").set_item("localPosts", "alpha").unwrap();

    let beta = open(&dir, "beta");
    assert_eq!(beta.get_item("localPosts").unwrap(), None);

    beta.set_item("localPosts", "beta").unwrap();
    beta.clear().unwrap();
    assert_eq!(
      open(&dir, "alpha").get_item("localPosts").unwrap().as_deref(),
      Some("alpha")
    );
  }

  #[test]
  fn test_idle_sessions_are_ended() {
    let dir = tempfile::tempdir().unwrap();
    let old = open(&dir, "old");
    old.set_item("localPosts", "[]").unwrap();
    {
      let conn = old.conn.lock().unwrap();
      conn
        .execute(
          "UPDATE session_storage SET updated_at = '2000-01-01 00:00:00' WHERE session = 'old'",
          [],
        )
        .unwrap();
    }
    drop(old);

    let _current = open(&dir, "current");
    assert_eq!(open(&dir, "old").get_item("localPosts").unwrap(), None);
  }
}
