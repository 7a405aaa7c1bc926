use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with the view breadcrumb and, when present, a
/// right-aligned toast message
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], toast: Option<&str>) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i == breadcrumb.len() - 1 {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };

    spans.push(Span::styled(part.clone(), style));
  }

  let background = Style::default().bg(Color::Black);
  frame.render_widget(Paragraph::new(Line::from(spans)).style(background), area);

  if let Some(message) = toast {
    let toast = Paragraph::new(Line::from(Span::styled(
      format!(" {} ", message),
      Style::default().fg(Color::Black).bg(Color::Green).bold(),
    )))
    .alignment(Alignment::Right);
    frame.render_widget(toast, area);
  }
}
