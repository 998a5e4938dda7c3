use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with logo, backend, signed-in user and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  backend: &str,
  user: Option<&str>,
  shortcuts: &[ShortcutInfo],
) {
  let mut spans = vec![
    Span::styled(" conflux ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", backend), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", user.unwrap_or("not signed in")),
      Style::default().fg(Color::Yellow).bold(),
    ),
    Span::raw(" "),
  ];
  spans.extend(shortcut_spans(shortcuts));

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// `<key> label` pairs in priority order
fn shortcut_spans(shortcuts: &[ShortcutInfo]) -> Vec<Span<'static>> {
  let mut sorted = shortcuts.to_vec();
  sorted.sort_by_key(|s| s.priority);

  sorted
    .into_iter()
    .flat_map(|shortcut| {
      [
        Span::raw("  "),
        Span::styled(format!("<{}>", shortcut.key), Style::default().fg(Color::Cyan)),
        Span::styled(
          format!(" {}", shortcut.label),
          Style::default().fg(Color::DarkGray),
        ),
      ]
    })
    .collect()
}
