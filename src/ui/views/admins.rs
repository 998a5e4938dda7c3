use crate::api::types::{NewSystemAdmin, SystemAdmin};
use crate::context::AppContext;
use crate::mutation::Mutation;
use crate::query::{Query, QueryState};
use crate::ui::components::{KeyResult, Prompt, PromptEvent};
use crate::ui::ensure_valid_selection;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::info;

/// System administrator management, for system admins only
pub struct AdminListView {
  query: Query<Vec<SystemAdmin>>,
  list_state: ListState,
  prompt: Prompt,
  add: Mutation<NewSystemAdmin, SystemAdmin>,
  remove: Mutation<SystemAdmin, SystemAdmin>,
  /// Admin awaiting `y` to confirm removal
  confirm_removal: Option<SystemAdmin>,
}

impl AdminListView {
  pub fn new(ctx: &AppContext) -> Self {
    let api = ctx.api.clone();
    let mut query = Query::new(move || {
      let api = api.clone();
      async move { api.list_system_admins().await }
    });
    query.fetch();

    let add = Mutation::new(ctx.api.clone(), |api, admin: NewSystemAdmin| async move {
      api.add_system_admin(admin).await
    })
    .on_success(|admin: &SystemAdmin| info!(email = %admin.email, "system admin added"));

    let remove = Mutation::new(ctx.api.clone(), |api, admin: SystemAdmin| async move {
      api.remove_system_admin(&admin.id).await?;
      Ok::<_, crate::api::ApiError>(admin)
    })
    .on_success(|admin: &SystemAdmin| info!(email = %admin.email, "system admin removed"));

    Self {
      query,
      list_state: ListState::default(),
      prompt: Prompt::new(),
      add,
      remove,
      confirm_removal: None,
    }
  }

  fn admins(&self) -> &[SystemAdmin] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<&SystemAdmin> {
    self.admins().get(self.list_state.selected()?)
  }

  fn busy(&self) -> bool {
    self.add.is_loading() || self.remove.is_loading()
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.admins().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.query.state() {
      QueryState::Idle | QueryState::Loading => " System administrators (loading...) ".to_string(),
      QueryState::Error(e) => format!(" System administrators (error: {}) ", e),
      QueryState::Success(_) if self.busy() => format!(" System administrators ({}) saving... ", len),
      QueryState::Success(_) => format!(" System administrators ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 {
      let content = if self.query.is_error() {
        "Failed to load administrators. Press 'r' to retry."
      } else if self.query.is_loading() {
        "Loading..."
      } else {
        "No system administrators."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .admins()
      .iter()
      .map(|admin| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<40}", admin.email),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(admin.name.clone().unwrap_or_default()),
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

impl View for AdminListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(email)) => {
        return if self.add.submit(NewSystemAdmin { email }) {
          ViewAction::None
        } else {
          ViewAction::Status("Still saving the previous change".to_string())
        };
      }
      KeyResult::Event(PromptEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    if let Some(admin) = self.confirm_removal.take() {
      if key.code == KeyCode::Char('y') {
        let email = admin.email.clone();
        if self.remove.submit(admin) {
          return ViewAction::Status(format!("Removing {}...", email));
        }
        return ViewAction::Status("Still saving the previous change".to_string());
      }
      return ViewAction::Status("Removal cancelled".to_string());
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('a') => self.prompt.show("Administrator email", ""),
      KeyCode::Char('d') => {
        if let Some(admin) = self.selected().cloned() {
          let message = format!("Remove {}? (y/n)", admin.email);
          self.confirm_removal = Some(admin);
          return ViewAction::Status(message);
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Admins".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();

    if self.add.poll() {
      if let Some(admin) = self.add.result() {
        let message = format!("Added {}", admin.email);
        self.query.refetch();
        return ViewAction::Status(message);
      }
      if let Some(error) = self.add.error() {
        return ViewAction::Status(format!("Add failed: {}", error));
      }
    }

    if self.remove.poll() {
      if let Some(admin) = self.remove.result() {
        let message = format!("Removed {}", admin.email);
        self.query.refetch();
        return ViewAction::Status(message);
      }
      if let Some(error) = self.remove.error() {
        return ViewAction::Status(format!("Remove failed: {}", error));
      }
    }

    ViewAction::None
  }

  fn is_capturing_input(&self) -> bool {
    self.prompt.is_active() || self.confirm_removal.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("a", "add").with_priority(20),
      ShortcutInfo::new("d", "remove").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
