use crate::api::{CacheKey, CachedPostsClient, Post};
use crate::detail::DetailResolver;
use crate::posts::{self, PostDraft};
use crate::query::{Query, QueryState};
use crate::session::LocalPostStore;
use crate::ui::components::{AddPostForm, FormEvent, KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::PostDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Root view: local and remote posts merged, filtered by the search term
pub struct PostListView {
  client: CachedPostsClient,
  store: LocalPostStore,
  resolver: DetailResolver,
  remote: Query<Vec<Post>>,
  local: watch::Receiver<Arc<Vec<Post>>>,
  local_ids: HashSet<u64>,
  rows: Vec<Post>,
  list_state: ListState,
  search: SearchInput,
  form: Option<AddPostForm>,
}

impl PostListView {
  pub fn new(client: CachedPostsClient, store: LocalPostStore) -> Self {
    let client_for_query = client.clone();
    let mut remote = Query::new(move || {
      let client = client_for_query.clone();
      async move { client.posts().await }
    });
    remote.fetch();

    let mut view = Self {
      resolver: DetailResolver::new(store.clone(), client.clone()),
      local: store.subscribe(),
      client,
      store,
      remote,
      local_ids: HashSet::new(),
      rows: Vec::new(),
      list_state: ListState::default(),
      search: SearchInput::new(),
      form: None,
    };
    view.rebuild();
    view
  }

  fn remote_posts(&self) -> &[Post] {
    self.remote.data().map(Vec::as_slice).unwrap_or(&[])
  }

  /// Recompute the visible rows from the latest local snapshot and remote data
  fn rebuild(&mut self) {
    let local = Arc::clone(&self.local.borrow_and_update());
    self.local_ids = local.iter().map(|p| p.id).collect();
    let combined = posts::combine(&local, self.remote_posts());
    self.rows = posts::filter(&combined, self.search.query());
  }

  fn refresh(&mut self) {
    self.client.invalidate(&CacheKey::Posts);
    self.remote.refetch();
  }

  fn open_form(&mut self) {
    self.form = Some(AddPostForm::new());
  }

  fn save(&mut self, draft: PostDraft) {
    let result = self.compose(draft).and_then(|post| {
      self
        .store
        .add(post)
        .map_err(|e| format!("Could not save post: {}", e))
    });

    match result {
      Ok(()) => {
        self.form = None;
        // Newest local post is the first row
        self.list_state.select(Some(0));
      }
      Err(message) => {
        warn!(error = %message, "post not added");
        if let Some(form) = &mut self.form {
          form.set_error(message);
        }
      }
    }
  }

  /// Build the new post. Its id must be unique across remote posts too, so
  /// nothing is composed until the remote collection has loaded.
  fn compose(&self, draft: PostDraft) -> Result<Post, String> {
    let Some(remote) = self.remote.data() else {
      return Err(match self.remote.error() {
        Some(e) => format!("Posts failed to load ({}). Close the form and press 'r'.", e),
        None => "Posts are still loading, try again in a moment.".to_string(),
      });
    };
    posts::compose(draft, &self.store.list(), remote).map_err(|e| e.to_string())
  }

  fn selected_post(&self) -> Option<&Post> {
    self.list_state.selected().and_then(|idx| self.rows.get(idx))
  }

  fn title(&self) -> String {
    let count = if self.search.query().trim().is_empty() {
      format!("{}", self.rows.len())
    } else {
      format!("{} matching /{}", self.rows.len(), self.search.query().trim())
    };
    match self.remote.state() {
      QueryState::Idle | QueryState::Loading => format!(" Posts ({}) (loading...) ", count),
      QueryState::Error(e) => format!(" Posts ({}) (error: {}) ", count, e),
      QueryState::Success(_) if self.remote.is_fetching() => format!(" Posts ({}) (refreshing...) ", count),
      QueryState::Success(_) => format!(" Posts ({}) ", count),
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    ensure_valid_selection(&mut self.list_state, self.rows.len());

    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if self.rows.is_empty() {
      let content = if self.remote.is_loading() {
        "Loading posts...".to_string()
      } else if !self.search.query().trim().is_empty() {
        format!("No posts match \"{}\".", self.search.query().trim())
      } else if let Some(e) = self.remote.error() {
        format!("Failed to load posts: {}\n\nPress 'r' to retry.", e)
      } else {
        "No posts yet. Press 'a' to add one.".to_string()
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let title_width = area.width.saturating_sub(18) as usize;
    let items: Vec<ListItem> = self
      .rows
      .iter()
      .map(|post| {
        let tag = if self.local_ids.contains(&post.id) {
          Span::styled("local ", Style::default().fg(Color::Green))
        } else {
          Span::raw("      ")
        };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:>5}", post.id), Style::default().fg(Color::Cyan)),
          Span::raw(" "),
          tag,
          Span::raw(truncate(&post.title, title_width)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for PostListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(form) = &mut self.form {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(draft)) => self.save(draft),
        KeyResult::Event(FormEvent::Cancelled) => self.form = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(_)) => {
        self.rebuild();
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('g') | KeyCode::Home => self.list_state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.list_state.select_last(),
      KeyCode::Char('a') => self.open_form(),
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Enter => {
        if let Some(post) = self.selected_post() {
          let ids = self.rows.iter().map(|p| p.id).collect();
          return ViewAction::Push(Box::new(PostDetailView::new(
            post.id,
            ids,
            self.resolver.clone(),
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.search.render_overlay(frame, area);
    if let Some(form) = &self.form {
      form.render(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Posts".to_string()
  }

  fn tick(&mut self) {
    let remote_changed = self.remote.poll();
    let local_changed = self.local.has_changed().unwrap_or(false);
    if remote_changed || local_changed {
      self.rebuild();
    }
  }

  fn is_capturing_input(&self) -> bool {
    self.form.is_some() || self.search.is_active()
  }

  fn handle_command(&mut self, command: &str) -> bool {
    match command {
      "new" => self.open_form(),
      "refresh" => self.refresh(),
      _ => return false,
    }
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("a", "add").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("Enter", "open").with_priority(50),
      ShortcutInfo::new("Tab", "next field").when_active(),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::cached_client::tests::{post, FakeApi};
  use crate::config::CacheConfig;
  use crate::session::MemorySessionStorage;
  use crossterm::event::KeyModifiers;
  use std::time::Duration;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn view_with(remote: Vec<Post>) -> (PostListView, LocalPostStore) {
    view_over(FakeApi {
      posts: remote,
      ..Default::default()
    })
  }

  fn view_over(api: FakeApi) -> (PostListView, LocalPostStore) {
    let api = Arc::new(api);
    let client = CachedPostsClient::new(api, &CacheConfig::default());
    let store = LocalPostStore::open(Box::new(MemorySessionStorage::new()));
    (PostListView::new(client, store.clone()), store)
  }

  async fn settle(view: &mut PostListView) {
    for _ in 0..100 {
      view.tick();
      if !view.remote.is_fetching() {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("post list did not load");
  }

  fn row_ids(view: &PostListView) -> Vec<u64> {
    view.rows.iter().map(|p| p.id).collect()
  }

  #[tokio::test]
  async fn test_local_posts_shadow_remote_rows() {
    let (mut view, store) = view_with(vec![post(1, "A"), post(2, "B")]);
    settle(&mut view).await;
    assert_eq!(row_ids(&view), vec![1, 2]);

    store.add(post(2, "B-local")).unwrap();
    view.tick();

    assert_eq!(row_ids(&view), vec![2, 1]);
    assert_eq!(view.rows[0].title, "B-local");
  }

  #[tokio::test]
  async fn test_search_filters_rows() {
    let (mut view, _store) = view_with(vec![post(1, "Hello World"), post(2, "other")]);
    settle(&mut view).await;

    view.handle_key(key(KeyCode::Char('/')));
    for c in "WORLD".chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    assert_eq!(row_ids(&view), vec![1]);

    view.handle_key(key(KeyCode::Esc));
    assert_eq!(row_ids(&view), vec![1, 2]);
  }

  #[tokio::test]
  async fn test_add_form_creates_local_post() {
    let (mut view, store) = view_with(vec![post(1, "A"), post(7, "B")]);
    settle(&mut view).await;

    view.handle_key(key(KeyCode::Char('a')));
    assert!(view.is_capturing_input());
    for c in "Drafted".chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    view.handle_key(key(KeyCode::Enter));
    view.handle_key(key(KeyCode::Backspace));
    view.handle_key(key(KeyCode::Char('2')));
    view.handle_key(key(KeyCode::Enter));
    for c in "Some thoughts worth keeping".chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    view.handle_key(key(KeyCode::Enter));

    assert!(view.form.is_none());
    assert_eq!(store.get(8).map(|p| p.user_id), Some(2));
    view.tick();
    assert_eq!(row_ids(&view), vec![8, 1, 7]);
  }

  fn submit_draft(view: &mut PostListView, title: &str, body: &str) {
    view.handle_key(key(KeyCode::Char('a')));
    for c in title.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    view.handle_key(key(KeyCode::Enter));
    view.handle_key(key(KeyCode::Enter));
    for c in body.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    view.handle_key(key(KeyCode::Enter));
  }

  #[tokio::test]
  async fn test_add_waits_for_remote_posts() {
    let (mut view, store) = view_over(FakeApi {
      posts: vec![post(1, "Remote one"), post(2, "Remote two")],
      delay: Some(Duration::from_millis(30)),
      ..Default::default()
    });

    submit_draft(&mut view, "Mine", "Written before the list arrived");
    // The form stays open with the draft intact
    assert!(store.list().is_empty());
    assert!(view.form.is_some());

    settle(&mut view).await;
    // Ctrl-S resubmits the kept draft once the remote ids are known
    view.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
    assert!(view.form.is_none());
    view.tick();
    assert_eq!(row_ids(&view), vec![3, 1, 2]);
  }
}
