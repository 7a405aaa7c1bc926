use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::session::StoreEvent;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Terminal resized, redraw
  Resize,
  /// Periodic tick for query polling
  Tick,
  /// Something happened in the local post store
  Store(StoreEvent),
}

/// Merges terminal input, a tick timer, and store notifications into one
/// stream
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm's poll blocks, so it gets its own thread
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
          Ok(CrosstermEvent::Resize(..)) => Event::Resize,
          _ => continue,
        }
      } else {
        Event::Tick
      };
      if input_tx.send(event).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Forward store notifications into the event stream.
  pub fn forward_store(&self, mut notifications: broadcast::Receiver<StoreEvent>) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      loop {
        match notifications.recv().await {
          Ok(event) => {
            if tx.send(Event::Store(event)).is_err() {
              break;
            }
          }
          Err(broadcast::error::RecvError::Lagged(skipped)) => {
            debug!(skipped, "store notifications lagged");
          }
          Err(broadcast::error::RecvError::Closed) => break,
        }
      }
    });
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
