use crate::api::types::{Language, UserSession};
use crate::api::ApiError;
use crate::context::AppContext;
use crate::query::{Query, QueryState};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Shown while nobody is signed in; `r` tries to establish a session again
pub struct LandingView {
  base_url: String,
  /// Why the last attempt failed, until a retry supersedes it
  reason: Option<ApiError>,
  query: Query<(UserSession, Vec<Language>)>,
}

impl LandingView {
  pub fn new(ctx: &AppContext) -> Self {
    let api = ctx.api.clone();
    let sessions = ctx.sessions.clone();
    let query = Query::new(move || AppContext::sign_in(api.clone(), sessions.clone()));

    Self {
      base_url: ctx.config.api.base_url.clone(),
      reason: ctx.session.as_ref().err().cloned(),
      query,
    }
  }

  fn message(&self) -> Vec<Line<'_>> {
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
      Line::styled("Not signed in", Style::default().fg(Color::Yellow).bold()),
      Line::raw(""),
      Line::from(vec![
        Span::styled("Backend: ", dim),
        Span::raw(&self.base_url),
      ]),
    ];

    let error = self.query.error().or(self.reason.as_ref());
    if self.query.is_loading() {
      lines.push(Line::raw(""));
      lines.push(Line::styled("Signing in...", Style::default().fg(Color::Cyan)));
    } else if let Some(error) = error {
      lines.push(Line::from(vec![
        Span::styled("Reason:  ", dim),
        Span::styled(error.to_string(), Style::default().fg(Color::Red)),
      ]));
      lines.push(Line::raw(""));
      let hint = if error.is_unauthorized() {
        "Sign in through the web portal or set CONFLUX_API_TOKEN, then press 'r' to retry."
      } else {
        "Press 'r' to retry."
      };
      lines.push(Line::styled(hint, dim));
    }

    lines
  }
}

impl View for LandingView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') | KeyCode::Enter => {
        self.query.fetch();
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue))
      .title(" Conflux ");
    let paragraph = Paragraph::new(self.message())
      .block(block)
      .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Sign in".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    if self.query.poll() {
      if let QueryState::Success((session, languages)) = self.query.state() {
        return ViewAction::SignedIn(session.clone(), languages.clone());
      }
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("r", "retry").with_priority(10),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
