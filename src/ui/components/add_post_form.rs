use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::posts::{DraftError, PostDraft};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Title,
  UserId,
  Body,
}

impl Field {
  const ALL: [Field; 3] = [Field::Title, Field::UserId, Field::Body];

  fn label(self) -> &'static str {
    match self {
      Field::Title => "Title",
      Field::UserId => "User ID",
      Field::Body => "Description",
    }
  }
}

const DEFAULT_USER_ID: &str = "1";

/// Events emitted by the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// A draft that passed validation
  Submitted(PostDraft),
  Cancelled,
}

/// Modal form for drafting a local post.
///
/// Tab/Shift-Tab move between fields, Enter advances and submits on the last
/// field, Esc cancels.
#[derive(Debug, Clone)]
pub struct AddPostForm {
  title: TextInput,
  user_id: TextInput,
  body: TextInput,
  focus: usize,
  error: Option<String>,
}

impl Default for AddPostForm {
  fn default() -> Self {
    Self::new()
  }
}

impl AddPostForm {
  pub fn new() -> Self {
    Self {
      title: TextInput::new(),
      user_id: TextInput::with_value(DEFAULT_USER_ID),
      body: TextInput::new(),
      focus: 0,
      error: None,
    }
  }

  /// Show an error that happened after submission (e.g. while saving).
  pub fn set_error(&mut self, message: impl Into<String>) {
    self.error = Some(message.into());
  }

  fn field(&self) -> Field {
    Field::ALL[self.focus]
  }

  fn input(&self, field: Field) -> &TextInput {
    match field {
      Field::Title => &self.title,
      Field::UserId => &self.user_id,
      Field::Body => &self.body,
    }
  }

  fn input_mut(&mut self, field: Field) -> &mut TextInput {
    match field {
      Field::Title => &mut self.title,
      Field::UserId => &mut self.user_id,
      Field::Body => &mut self.body,
    }
  }

  /// Current contents as a draft. A user id that is not a positive number
  /// becomes 0, which validation rejects.
  pub fn draft(&self) -> PostDraft {
    PostDraft {
      title: self.title.value().to_string(),
      user_id: self.user_id.value().trim().parse().unwrap_or(0),
      body: self.body.value().to_string(),
    }
  }

  fn submit(&mut self) -> KeyResult<FormEvent> {
    let draft = self.draft();
    match draft.validate() {
      Ok(()) => KeyResult::Event(FormEvent::Submitted(draft)),
      Err(e) => {
        self.focus = match e {
          DraftError::TitleTooShort => 0,
          DraftError::InvalidUserId => 1,
          DraftError::BodyTooShort => 2,
          DraftError::IdsExhausted => self.focus,
        };
        self.error = Some(e.to_string());
        KeyResult::Handled
      }
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    match key.code {
      KeyCode::Esc => return KeyResult::Event(FormEvent::Cancelled),
      KeyCode::Tab | KeyCode::Down => {
        self.focus = (self.focus + 1) % Field::ALL.len();
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focus = (self.focus + Field::ALL.len() - 1) % Field::ALL.len();
        return KeyResult::Handled;
      }
      KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        return self.submit();
      }
      KeyCode::Char(c) if self.field() == Field::UserId && !c.is_ascii_digit() => {
        return KeyResult::Handled;
      }
      _ => {}
    }

    let field = self.field();
    match self.input_mut(field).handle_key(key) {
      InputResult::Submitted(_) if self.focus + 1 < Field::ALL.len() => {
        self.focus += 1;
        KeyResult::Handled
      }
      InputResult::Submitted(_) => self.submit(),
      InputResult::Consumed => {
        self.error = None;
        KeyResult::Handled
      }
      InputResult::Cancelled => KeyResult::Event(FormEvent::Cancelled),
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let width = (area.width * 70 / 100).clamp(40, 80).min(area.width);
    let height = 12.min(area.height);
    let popup = Rect::new(
      area.x + (area.width.saturating_sub(width)) / 2,
      area.y + (area.height.saturating_sub(height)) / 2,
      width,
      height,
    );

    frame.render_widget(Clear, popup);

    let block = Block::default()
      .title(" New post ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let mut lines = Vec::new();
    for (idx, field) in Field::ALL.iter().enumerate() {
      let focused = idx == self.focus;
      let label_style = if focused {
        Style::default().fg(Color::Yellow).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      let mut spans = vec![Span::styled(format!("{:<13}", field.label()), label_style)];
      if focused {
        spans.extend(self.input(*field).spans(Style::default().reversed()));
      } else {
        spans.push(Span::raw(self.input(*field).value().to_string()));
      }
      lines.push(Line::from(spans));
      lines.push(Line::raw(""));
    }

    match &self.error {
      Some(error) => lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red))),
      None => lines.push(Line::raw("")),
    }
    lines.push(Line::styled(
      "Tab: next field  Enter: next/submit  Ctrl-S: submit  Esc: cancel",
      Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
  }
}
