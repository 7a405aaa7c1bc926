use crate::ui::view::{ShortcutInfo, ShortcutVisibility};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with app name, data source, and the current view's
/// shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  session: &str,
  shortcuts: &[ShortcutInfo],
  input_active: bool,
) {
  let mut spans = vec![
    Span::styled(" postdeck ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", session),
      Style::default().fg(Color::Yellow).bold(),
    ),
    Span::raw(" "),
  ];

  for shortcut in visible_shortcuts(shortcuts, input_active) {
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Shortcuts to show, ordered by priority
fn visible_shortcuts(shortcuts: &[ShortcutInfo], input_active: bool) -> Vec<&ShortcutInfo> {
  let mut visible: Vec<&ShortcutInfo> = shortcuts
    .iter()
    .filter(|s| input_active || s.visibility == ShortcutVisibility::Always)
    .collect();
  visible.sort_by_key(|s| s.priority);
  visible
}
