//! Posts drafted locally during the session.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use super::error::StoreError;
use super::storage::SessionStorage;
use crate::api::Post;

/// Session storage slot holding the JSON-serialized local post set
pub(crate) const STORAGE_KEY: &str = "localPosts";

/// One-shot notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
  PostAdded(Post),
}

/// Ordered (newest first) set of locally added posts.
///
/// Cheap to clone; clones share the same set. Every mutation writes the full
/// set to session storage before it becomes visible in memory, then publishes
/// the new snapshot to subscribers.
#[derive(Clone)]
pub struct LocalPostStore {
  inner: Arc<Inner>,
}

struct Inner {
  storage: Box<dyn SessionStorage>,
  posts: Mutex<Arc<Vec<Post>>>,
  changes: watch::Sender<Arc<Vec<Post>>>,
  events: broadcast::Sender<StoreEvent>,
}

impl LocalPostStore {
  /// Restore the set persisted in `storage`.
  ///
  /// A missing, unreadable, or malformed slot yields an empty set.
  pub fn open(storage: Box<dyn SessionStorage>) -> Self {
    let posts = match load(storage.as_ref()) {
      Ok(posts) => posts,
      Err(e) => {
        warn!(error = %e, "discarding persisted local posts");
        if let Err(e) = storage.remove_item(STORAGE_KEY) {
          warn!(error = %e, "failed to clear local posts slot");
        }
        Vec::new()
      }
    };
    info!(count = posts.len(), "local posts restored");

    let posts = Arc::new(posts);
    let (changes, _) = watch::channel(Arc::clone(&posts));
    let (events, _) = broadcast::channel(16);

    Self {
      inner: Arc::new(Inner {
        storage,
        posts: Mutex::new(posts),
        changes,
        events,
      }),
    }
  }

  /// Current snapshot, newest first.
  pub fn list(&self) -> Arc<Vec<Post>> {
    let posts = self.inner.posts.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(&posts)
  }

  /// Look up a local post by id.
  pub fn get(&self, id: u64) -> Option<Post> {
    self.list().iter().find(|p| p.id == id).cloned()
  }

  /// Prepend `post` and persist the updated set.
  pub fn add(&self, post: Post) -> Result<(), StoreError> {
    let snapshot = {
      let mut posts = self.inner.posts.lock().unwrap_or_else(PoisonError::into_inner);
      if posts.iter().any(|p| p.id == post.id) {
        return Err(StoreError::DuplicateId(post.id));
      }

      let mut next = Vec::with_capacity(posts.len() + 1);
      next.push(post.clone());
      next.extend(posts.iter().cloned());

      // Persist first so memory never runs ahead of storage
      let json = serde_json::to_string(&next).map_err(|e| StoreError::Storage(e.to_string()))?;
      self.inner.storage.set_item(STORAGE_KEY, &json)?;

      let next = Arc::new(next);
      *posts = Arc::clone(&next);
      next
    };

    info!(id = post.id, count = snapshot.len(), "local post added");
    self.inner.changes.send_replace(snapshot);
    // No receivers is fine
    let _ = self.inner.events.send(StoreEvent::PostAdded(post));
    Ok(())
  }

  /// Change signal carrying the latest snapshot.
  pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Post>>> {
    self.inner.changes.subscribe()
  }

  /// "Post added" notifications.
  pub fn notifications(&self) -> broadcast::Receiver<StoreEvent> {
    self.inner.events.subscribe()
  }
}

fn load(storage: &dyn SessionStorage) -> Result<Vec<Post>, StoreError> {
  let Some(raw) = storage.get_item(STORAGE_KEY)? else {
    return Ok(Vec::new());
  };

  let posts: Vec<Post> =
    serde_json::from_str(&raw).map_err(|e| StoreError::MalformedPersistedState(e.to_string()))?;

  // Keep the first occurrence of each id
  let mut deduped: Vec<Post> = Vec::with_capacity(posts.len());
  for post in posts {
    if deduped.iter().any(|p| p.id == post.id) {
      warn!(id = post.id, "dropping duplicate persisted local post");
      continue;
    }
    deduped.push(post);
  }
  Ok(deduped)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::MemorySessionStorage;

  fn post(id: u64, title: &str) -> Post {
    Post {
      id,
      user_id: 1,
      title: title.to_string(),
      body: "a locally drafted body".to_string(),
    }
  }

  fn storage_with(raw: &str) -> Box<MemorySessionStorage> {
    let storage = MemorySessionStorage::new();
    storage.set_item(STORAGE_KEY, raw).unwrap();
    Box::new(storage)
  }

  /// Storage whose writes always fail
  struct ReadOnlyStorage;

  impl SessionStorage for ReadOnlyStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StoreError> {
      Ok(None)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
      Err(StoreError::Storage("disk full".to_string()))
    }

    fn remove_item(&self, _key: &str) -> Result<(), StoreError> {
      Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
      Ok(())
    }
  }

  #[test]
  fn test_missing_slot_is_empty() {
    let store = LocalPostStore::open(Box::new(MemorySessionStorage::new()));
    assert!(store.list().is_empty());
  }

  #[test]
  fn test_corrupt_slot_is_empty() {
    let store = LocalPostStore::open(storage_with("{not json"));
    assert!(store.list().is_empty());

    let store = LocalPostStore::open(storage_with(r#"{"id":1}"#));
    assert!(store.list().is_empty());
    // The unreadable slot is dropped
    assert_eq!(store.inner.storage.get_item(STORAGE_KEY).unwrap(), None);
  }

  #[test]
  fn test_add_prepends_and_persists() {
    let store = LocalPostStore::open(Box::new(MemorySessionStorage::new()));
    store.add(post(101, "first")).unwrap();
    store.add(post(102, "second")).unwrap();

    let ids: Vec<u64> = store.list().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![102, 101]);

    let raw = store.inner.storage.get_item(STORAGE_KEY).unwrap().unwrap();
    let persisted: Vec<Post> = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted, *store.list());
  }

  #[test]
  fn test_restores_persisted_order() {
    let raw = serde_json::to_string(&vec![post(3, "c"), post(2, "b")]).unwrap();
    let store = LocalPostStore::open(storage_with(&raw));

    assert_eq!(store.get(2).map(|p| p.title), Some("b".to_string()));
    let ids: Vec<u64> = store.list().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![3, 2]);
  }

  #[test]
  fn test_persisted_duplicates_are_dropped() {
    let raw = serde_json::to_string(&vec![post(5, "newer"), post(5, "older")]).unwrap();
    let store = LocalPostStore::open(storage_with(&raw));

    assert_eq!(store.list().len(), 1);
    assert_eq!(store.list()[0].title, "newer");
  }

  #[test]
  fn test_duplicate_id_is_rejected() {
    let store = LocalPostStore::open(Box::new(MemorySessionStorage::new()));
    store.add(post(7, "one")).unwrap();

    let err = store.add(post(7, "two")).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId(7)));
    assert_eq!(store.list().len(), 1);
  }

  #[test]
  fn test_failed_write_leaves_memory_unchanged() {
    let store = LocalPostStore::open(Box::new(ReadOnlyStorage));
    let mut changes = store.subscribe();

    assert!(store.add(post(1, "lost")).is_err());
    assert!(store.list().is_empty());
    assert!(!changes.has_changed().unwrap());
  }

  #[tokio::test]
  async fn test_subscribers_see_new_snapshot() {
    let store = LocalPostStore::open(Box::new(MemorySessionStorage::new()));
    let mut changes = store.subscribe();
    let mut events = store.notifications();

    store.add(post(11, "hello")).unwrap();

    changes.changed().await.unwrap();
    assert_eq!(changes.borrow_and_update().len(), 1);
    assert_eq!(
      events.recv().await.unwrap(),
      StoreEvent::PostAdded(post(11, "hello"))
    );
  }
}
