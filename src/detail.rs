//! Resolution of a single post page: the post itself, its author, and its
//! comments.
//!
//! The three resolutions run independently. A post drafted locally is taken
//! from the local store without any network request; everything else goes
//! through the cached client. Results are tagged with the post id and a
//! generation number, and anything that no longer matches the page (the user
//! navigated elsewhere, or a retry superseded the request) is dropped.

use tokio::sync::mpsc;
use tracing::debug;

use crate::api::{ApiError, CacheKey, CachedPostsClient, Comment, Post, User};
use crate::session::LocalPostStore;

/// Where a resolved post came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOrigin {
  Local,
  Remote,
}

/// Looks up posts, preferring the local store, and their related resources.
#[derive(Clone)]
pub struct DetailResolver {
  local: LocalPostStore,
  client: CachedPostsClient,
}

impl DetailResolver {
  pub fn new(local: LocalPostStore, client: CachedPostsClient) -> Self {
    Self { local, client }
  }

  /// Resolve a post by id. Local posts never touch the network.
  pub async fn resolve_post(&self, id: u64) -> Result<(Post, PostOrigin), ApiError> {
    if let Some(post) = self.local.get(id) {
      debug!(id, "post resolved from local store");
      return Ok((post, PostOrigin::Local));
    }
    let post = self.client.post(id).await?;
    Ok((post, PostOrigin::Remote))
  }

  pub async fn resolve_author(&self, user_id: u64) -> Result<User, ApiError> {
    self.client.user(user_id).await
  }

  pub async fn resolve_comments(&self, post_id: u64) -> Result<Vec<Comment>, ApiError> {
    self.client.comments(post_id).await
  }

  fn forget(&self, key: &CacheKey) {
    self.client.invalidate(key);
  }
}

/// Primary content of the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostState {
  Resolving,
  Ready { post: Post, origin: PostOrigin },
  Error(ApiError),
}

/// Author section; only starts once the post is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorState {
  /// Waiting for the post (and so the user id)
  Waiting,
  Resolving { user_id: u64 },
  Ready(User),
  /// Lookup failed; rendered as "Unknown author"
  Unknown { user_id: u64 },
}

/// Comments section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentsState {
  Resolving,
  Ready(Vec<Comment>),
  Empty,
  Error(ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
  Post,
  Author,
  Comments,
}

enum Payload {
  Post(Result<(Post, PostOrigin), ApiError>),
  Author(Result<User, ApiError>),
  Comments(Result<Vec<Comment>, ApiError>),
}

impl Payload {
  fn section(&self) -> Section {
    match self {
      Payload::Post(_) => Section::Post,
      Payload::Author(_) => Section::Author,
      Payload::Comments(_) => Section::Comments,
    }
  }
}

struct Message {
  post_id: u64,
  generation: u64,
  payload: Payload,
}

/// State of one post page.
///
/// Call [`poll`](Self::poll) from the event loop tick to apply results.
pub struct DetailPage {
  post_id: u64,
  resolver: DetailResolver,
  post: PostState,
  author: AuthorState,
  comments: CommentsState,
  generation: u64,
  post_generation: u64,
  author_generation: u64,
  comments_generation: u64,
  tx: mpsc::UnboundedSender<Message>,
  rx: mpsc::UnboundedReceiver<Message>,
}

impl DetailPage {
  /// Open the page for `post_id` and start resolving the post and its
  /// comments.
  pub fn open(post_id: u64, resolver: DetailResolver) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut page = Self {
      post_id,
      resolver,
      post: PostState::Resolving,
      author: AuthorState::Waiting,
      comments: CommentsState::Resolving,
      generation: 0,
      post_generation: 0,
      author_generation: 0,
      comments_generation: 0,
      tx,
      rx,
    };
    page.start_post();
    page.start_comments();
    page
  }

  pub fn post_id(&self) -> u64 {
    self.post_id
  }

  pub fn post(&self) -> &PostState {
    &self.post
  }

  pub fn author(&self) -> &AuthorState {
    &self.author
  }

  pub fn comments(&self) -> &CommentsState {
    &self.comments
  }

  /// Switch the page to another post. Results still in flight for the
  /// previous post are discarded when they arrive.
  pub fn navigate(&mut self, post_id: u64) {
    debug!(from = self.post_id, to = post_id, "detail page navigated");
    self.post_id = post_id;
    self.post = PostState::Resolving;
    self.retire_author();
    self.comments = CommentsState::Resolving;
    self.start_post();
    self.start_comments();
  }

  /// Re-run the sections that failed. The post is re-fetched from the
  /// network; a failed author lookup is retried as well.
  pub fn retry(&mut self) {
    if let PostState::Error(_) = self.post {
      self.resolver.forget(&CacheKey::Post { id: self.post_id });
      self.post = PostState::Resolving;
      self.retire_author();
      self.start_post();
    }
    if let AuthorState::Unknown { user_id } = self.author {
      self.resolver.forget(&CacheKey::User { id: user_id });
      self.start_author(user_id);
    }
    if let CommentsState::Error(_) = self.comments {
      self
        .resolver
        .forget(&CacheKey::Comments {
          post_id: self.post_id,
        });
      self.comments = CommentsState::Resolving;
      self.start_comments();
    }
  }

  /// Whether any section is still waiting on the network
  pub fn is_resolving(&self) -> bool {
    matches!(self.post, PostState::Resolving)
      || matches!(self.author, AuthorState::Resolving { .. })
      || matches!(self.comments, CommentsState::Resolving)
  }

  /// Apply results that arrived since the last call.
  ///
  /// Returns `true` if any section changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Ok(message) = self.rx.try_recv() {
      if self.accepts(&message) {
        self.apply(message.payload);
        changed = true;
      } else {
        debug!(
          post_id = message.post_id,
          current = self.post_id,
          "discarding stale detail result"
        );
      }
    }
    changed
  }

  fn accepts(&self, message: &Message) -> bool {
    let current = match message.payload.section() {
      Section::Post => self.post_generation,
      Section::Author => self.author_generation,
      Section::Comments => self.comments_generation,
    };
    message.post_id == self.post_id && message.generation == current
  }

  fn apply(&mut self, payload: Payload) {
    match payload {
      Payload::Post(Ok((post, origin))) => {
        let user_id = post.user_id;
        self.post = PostState::Ready { post, origin };
        self.start_author(user_id);
      }
      Payload::Post(Err(e)) => {
        self.post = PostState::Error(e);
      }
      Payload::Author(Ok(user)) => {
        self.author = AuthorState::Ready(user);
      }
      Payload::Author(Err(e)) => {
        if let AuthorState::Resolving { user_id } = self.author {
          debug!(user_id, error = %e, "author unavailable");
          self.author = AuthorState::Unknown { user_id };
        }
      }
      Payload::Comments(Ok(comments)) if comments.is_empty() => {
        self.comments = CommentsState::Empty;
      }
      Payload::Comments(Ok(comments)) => {
        self.comments = CommentsState::Ready(comments);
      }
      Payload::Comments(Err(e)) => {
        self.comments = CommentsState::Error(e);
      }
    }
  }

  fn next_generation(&mut self) -> u64 {
    self.generation += 1;
    self.generation
  }

  /// Reset the author section and drop any lookup still in flight for it
  fn retire_author(&mut self) {
    self.author = AuthorState::Waiting;
    self.author_generation = self.next_generation();
  }

  fn start_post(&mut self) {
    let generation = self.next_generation();
    self.post_generation = generation;
    let post_id = self.post_id;
    let resolver = self.resolver.clone();
    let tx = self.tx.clone();

    tokio::spawn(async move {
      let result = resolver.resolve_post(post_id).await;
      // Receiver gone means the page was closed
      let _ = tx.send(Message {
        post_id,
        generation,
        payload: Payload::Post(result),
      });
    });
  }

  fn start_author(&mut self, user_id: u64) {
    let generation = self.next_generation();
    self.author_generation = generation;
    self.author = AuthorState::Resolving { user_id };
    let post_id = self.post_id;
    let resolver = self.resolver.clone();
    let tx = self.tx.clone();

    tokio::spawn(async move {
      let result = resolver.resolve_author(user_id).await;
      let _ = tx.send(Message {
        post_id,
        generation,
        payload: Payload::Author(result),
      });
    });
  }

  fn start_comments(&mut self) {
    let generation = self.next_generation();
    self.comments_generation = generation;
    let post_id = self.post_id;
    let resolver = self.resolver.clone();
    let tx = self.tx.clone();

    tokio::spawn(async move {
      let result = resolver.resolve_comments(post_id).await;
      let _ = tx.send(Message {
        post_id,
        generation,
        payload: Payload::Comments(result),
      });
    });
  }
}
