use crate::detail::{AuthorState, CommentsState, DetailPage, DetailResolver, PostOrigin, PostState};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// A single post with its author and comments
pub struct PostDetailView {
  page: DetailPage,
  /// Ids of the list this view was opened from, for next/previous
  siblings: Vec<u64>,
  scroll: u16,
}

impl PostDetailView {
  pub fn new(post_id: u64, siblings: Vec<u64>, resolver: DetailResolver) -> Self {
    Self {
      page: DetailPage::open(post_id, resolver),
      siblings,
      scroll: 0,
    }
  }

  /// Move to the neighbouring post in the list, if any
  fn step(&mut self, forward: bool) {
    let Some(idx) = self.siblings.iter().position(|id| *id == self.page.post_id()) else {
      return;
    };
    let next = if forward {
      idx.checked_add(1)
    } else {
      idx.checked_sub(1)
    };
    if let Some(&id) = next.and_then(|i| self.siblings.get(i)) {
      self.page.navigate(id);
      self.scroll = 0;
    }
  }

  fn post_lines(&self) -> Vec<Line<'_>> {
    let label = Style::default().fg(Color::DarkGray);
    let (post, origin) = match self.page.post() {
      PostState::Ready { post, origin } => (post, *origin),
      PostState::Resolving => return vec![Line::styled("Loading post...", label)],
      PostState::Error(e) if e.is_not_found() => {
        return vec![
          Line::styled(format!("Post {} not found.", self.page.post_id()), Style::default().fg(Color::Red)),
          Line::raw(""),
          Line::styled("Press 'r' to retry or 'q' to go back.", label),
        ];
      }
      PostState::Error(e) => {
        return vec![
          Line::styled(format!("Error: {}", e), Style::default().fg(Color::Red)),
          Line::raw(""),
          Line::styled("Press 'r' to retry.", label),
        ];
      }
    };

    let mut header = vec![
      Span::styled(post.title.clone(), Style::default().bold()),
      Span::raw("  "),
    ];
    if origin == PostOrigin::Local {
      header.push(Span::styled("[local]", Style::default().fg(Color::Green)));
    }

    let mut lines = vec![Line::from(header)];
    lines.extend(self.author_lines());
    lines.push(Line::raw(""));
    lines.extend(post.body.lines().map(|l| Line::raw(l.to_string())));
    lines
  }

  /// "by" line plus the author's contact details once known
  fn author_lines(&self) -> Vec<Line<'_>> {
    let label = Style::default().fg(Color::DarkGray);
    let by = |author: Span<'static>| Line::from(vec![Span::styled("by ", label), author]);

    match self.page.author() {
      AuthorState::Waiting | AuthorState::Resolving { .. } => {
        vec![by(Span::styled("loading author...", label))]
      }
      AuthorState::Unknown { user_id } => vec![by(Span::styled(
        format!("Unknown author (ID: {})", user_id),
        Style::default().fg(Color::Red),
      ))],
      AuthorState::Ready(user) => {
        let mut contact = vec![Span::raw("   "), Span::styled(user.email.clone(), label)];
        if !user.website.is_empty() {
          contact.push(Span::styled(format!("  {}", user.website), Style::default().fg(Color::Blue)));
        }
        vec![
          by(Span::styled(
            format!("{} (@{})", user.name, user.username),
            Style::default().fg(Color::Yellow),
          )),
          Line::from(contact),
        ]
      }
    }
  }

  fn comment_lines(&self) -> Vec<Line<'_>> {
    let label = Style::default().fg(Color::DarkGray);
    let heading = |count: Option<usize>| {
      let text = match count {
        Some(n) => format!("Comments ({})", n),
        None => "Comments".to_string(),
      };
      Line::styled(text, Style::default().fg(Color::Cyan).bold())
    };

    match self.page.comments() {
      CommentsState::Resolving => vec![heading(None), Line::styled("Loading comments...", label)],
      CommentsState::Empty => vec![heading(Some(0)), Line::styled("No comments yet.", label)],
      CommentsState::Error(e) => vec![
        heading(None),
        Line::styled(
          format!("Failed to load comments: {}. Press 'r' to retry.", e),
          Style::default().fg(Color::Red),
        ),
      ],
      CommentsState::Ready(comments) => {
        let mut lines = vec![heading(Some(comments.len()))];
        for comment in comments {
          lines.push(Line::raw(""));
          lines.push(Line::from(vec![
            Span::styled(comment.name.clone(), Style::default().bold()),
            Span::styled(format!("  <{}>", comment.email), label),
          ]));
          lines.extend(comment.body.lines().map(|l| Line::raw(format!("  {}", l))));
        }
        lines
      }
    }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = if self.page.is_resolving() {
      format!(" Post {} (loading...) ", self.page.post_id())
    } else {
      format!(" Post {} ", self.page.post_id())
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let mut lines = self.post_lines();
    lines.push(Line::raw(""));
    lines.push(Line::styled(
      "─".repeat(area.width.saturating_sub(2) as usize),
      Style::default().fg(Color::DarkGray),
    ));
    lines.extend(self.comment_lines());

    let paragraph = Paragraph::new(lines)
      .block(block)
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, area);
  }
}

impl View for PostDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.page.retry(),
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('n') => self.step(true),
      KeyCode::Char('p') => self.step(false),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("#{}", self.page.post_id())
  }

  fn tick(&mut self) {
    self.page.poll();
  }

  fn handle_command(&mut self, command: &str) -> bool {
    if command == "refresh" {
      self.page.retry();
      return true;
    }
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "retry").with_priority(20),
      ShortcutInfo::new("n/p", "next/prev").with_priority(30),
      ShortcutInfo::new("j/k", "scroll").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::cached_client::tests::{post, user, FakeApi};
  use crate::api::CachedPostsClient;
  use crate::config::CacheConfig;
  use crate::session::{LocalPostStore, MemorySessionStorage};
  use crossterm::event::KeyModifiers;
  use std::collections::HashMap;
  use std::sync::Arc;
  use std::time::Duration;

  fn resolver_over(api: FakeApi) -> DetailResolver {
    let client = CachedPostsClient::new(Arc::new(api), &CacheConfig::default());
    let store = LocalPostStore::open(Box::new(MemorySessionStorage::new()));
    DetailResolver::new(store, client)
  }

  async fn settle(view: &mut PostDetailView) {
    for _ in 0..100 {
      view.tick();
      if !view.page.is_resolving() {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("detail view did not settle");
  }

  fn author_text(view: &PostDetailView) -> Vec<String> {
    view
      .author_lines()
      .iter()
      .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
      .collect()
  }

  #[tokio::test]
  async fn test_author_contact_details() {
    let mut no_site = user(2);
    no_site.website = String::new();
    let mut second = post(2, "B");
    second.user_id = 2;

    let resolver = resolver_over(FakeApi {
      posts: vec![post(1, "A"), second],
      users: HashMap::from([(1, user(1)), (2, no_site)]),
      ..Default::default()
    });
    let mut view = PostDetailView::new(1, vec![1, 2], resolver);
    settle(&mut view).await;

    assert_eq!(
      author_text(&view),
      vec!["by Leanne Graham (@Bret)", "   Sincere@april.biz  hildegard.org"]
    );

    view.handle_key(KeyEvent::new(KeyCode::Char('n'), KeyModifiers::NONE));
    settle(&mut view).await;
    assert_eq!(author_text(&view)[1], "   Sincere@april.biz");
  }

  #[tokio::test]
  async fn test_next_and_previous_follow_list_order() {
    let resolver = resolver_over(FakeApi {
      posts: vec![post(1, "A"), post(2, "B"), post(3, "C")],
      ..Default::default()
    });

    let mut view = PostDetailView::new(3, vec![3, 1, 2], resolver);
    let key = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);

    view.handle_key(key('n'));
    assert_eq!(view.page.post_id(), 1);
    view.handle_key(key('n'));
    view.handle_key(key('n'));
    assert_eq!(view.page.post_id(), 2);
    view.handle_key(key('p'));
    assert_eq!(view.page.post_id(), 1);
    assert_eq!(view.breadcrumb_label(), "#1");
  }
}
