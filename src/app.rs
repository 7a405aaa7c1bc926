use crate::api::CachedPostsClient;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::session::{LocalPostStore, StoreEvent};
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{draw_footer, draw_header};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::PostListView;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(100);
const TOAST_DURATION: Duration = Duration::from_secs(3);

/// A short-lived message in the footer
struct Toast {
  message: String,
  expires_at: Instant,
}

/// Main application state
pub struct App {
  title: String,
  session: String,
  store: LocalPostStore,

  /// Navigation stack; the post list is always at index 0
  view_stack: Vec<Box<dyn View>>,

  command: CommandInput,
  toast: Option<Toast>,
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, session: String, client: CachedPostsClient, store: LocalPostStore) -> Self {
    let root = PostListView::new(client, store.clone());
    Self {
      title: config.display_title(),
      session,
      store,
      view_stack: vec![Box::new(root)],
      command: CommandInput::new(),
      toast: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even if the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);
    events.forward_store(self.store.notifications());

    while !self.should_quit {
      terminal.draw(|frame| self.draw(frame))?;

      let Some(event) = events.next().await else {
        break;
      };
      match event {
        Event::Key(key) => self.handle_key(key),
        Event::Tick => self.tick(),
        Event::Resize => {}
        Event::Store(StoreEvent::PostAdded(post)) => {
          info!(id = post.id, "post added");
          self.show_toast("Post added successfully");
        }
      }
    }

    Ok(())
  }

  fn tick(&mut self) {
    if let Some(view) = self.view_stack.last_mut() {
      view.tick();
    }
    if self.toast.as_ref().is_some_and(|t| t.expires_at <= Instant::now()) {
      self.toast = None;
    }
  }

  fn show_toast(&mut self, message: impl Into<String>) {
    self.toast = Some(Toast {
      message: message.into(),
      expires_at: Instant::now() + TOAST_DURATION,
    });
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self
      .view_stack
      .last()
      .is_some_and(|view| view.is_capturing_input());
    if !capturing {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(&cmd);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.view_stack.last_mut() else {
      return;
    };
    match view.handle_key(key) {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn execute_command(&mut self, cmd: &str) {
    debug!(cmd, "command");
    match cmd {
      "quit" => self.should_quit = true,
      "posts" => self.view_stack.truncate(1),
      "new" => {
        self.view_stack.truncate(1);
        if let Some(root) = self.view_stack.first_mut() {
          root.handle_command(cmd);
        }
      }
      "refresh" => {
        if let Some(view) = self.view_stack.last_mut() {
          view.handle_command(cmd);
        }
      }
      _ => self.show_toast(format!("Unknown command: {}", cmd)),
    }
  }

  fn draw(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Header
        Constraint::Min(1),    // Current view
        Constraint::Length(1), // Footer
      ])
      .split(frame.area());

    let breadcrumb: Vec<String> = self.view_stack.iter().map(|v| v.breadcrumb_label()).collect();

    if let Some(view) = self.view_stack.last_mut() {
      let shortcuts = view.shortcuts();
      draw_header(
        frame,
        chunks[0],
        &self.title,
        &self.session,
        &shortcuts,
        view.is_capturing_input(),
      );
      view.render(frame, chunks[1]);
    }
    self.command.render_overlay(frame, chunks[1]);

    draw_footer(
      frame,
      chunks[2],
      &breadcrumb,
      self.toast.as_ref().map(|t| t.message.as_str()),
    );
  }
}
