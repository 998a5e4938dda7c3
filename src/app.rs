use crate::api::ApiError;
use crate::context::AppContext;
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{AdminListView, DashboardView, LandingView, ProjectDetailView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(100);
const STATUS_TTL: Duration = Duration::from_secs(5);

/// Main application state
pub struct App {
  ctx: AppContext,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command line
  command: CommandInput,

  /// Footer message and when it was set
  status: Option<(String, Instant)>,

  should_quit: bool,
}

impl App {
  /// Build the app, optionally opening a project straight away.
  pub fn new(ctx: AppContext, open_project: Option<String>) -> Self {
    let mut app = Self {
      ctx,
      view_stack: Vec::new(),
      command: CommandInput::new(),
      status: None,
      should_quit: false,
    };
    app.reset_to_home();

    if let Some(id) = open_project {
      if app.ctx.user().is_some() {
        app.push(Box::new(ProjectDetailView::new(app.ctx.clone(), vec![id], 0)));
      }
    }
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    // Everything after raw mode is on, terminal setup included, restores on the way out
    with_restore(self.run_in_terminal(), restore_terminal).await
  }

  async fn run_in_terminal(&mut self) -> Result<()> {
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(TICK_RATE);
    self.event_loop(&mut terminal, &mut events).await
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Resize) => {}
        Some(Event::Tick) => {}
        None => break,
      }
      self.tick();
    }
    Ok(())
  }

  // ==========================================================================
  // Accessors used by the draw function
  // ==========================================================================

  pub fn ctx(&self) -> &AppContext {
    &self.ctx
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.view_stack.iter().map(|v| v.breadcrumb_label()).collect()
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_ref().map(|(msg, _)| msg.as_str())
  }

  // ==========================================================================
  // Input and actions
  // ==========================================================================

  fn tick(&mut self) {
    if let Some((_, set_at)) = &self.status {
      if set_at.elapsed() > STATUS_TTL {
        self.status = None;
      }
    }

    // Only the top view is polled; views below resume polling when revealed
    let action = match self.view_stack.last_mut() {
      Some(view) => view.tick(),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self
      .current_view()
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

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::SignedIn(session, languages) => {
        info!(user = %session.email, "signed in");
        self.ctx.apply_sign_in(Ok((session, languages)));
        self.reset_to_home();
      }
      ViewAction::Status(message) => self.set_status(message),
    }
  }

  fn push(&mut self, view: Box<dyn View>) {
    debug!(view = %view.breadcrumb_label(), "push view");
    self.view_stack.push(view);
  }

  fn set_status(&mut self, message: impl Into<String>) {
    self.status = Some((message.into(), Instant::now()));
  }

  /// Replace the whole stack with the dashboard, or the landing view when
  /// nobody is signed in
  fn reset_to_home(&mut self) {
    self.command.set_admin(self.ctx.is_system_admin());
    self.view_stack.clear();
    let root: Box<dyn View> = if self.ctx.user().is_some() {
      Box::new(DashboardView::new(self.ctx.clone()))
    } else {
      Box::new(LandingView::new(&self.ctx))
    };
    self.view_stack.push(root);
  }

  fn execute_command(&mut self, cmd: &str) {
    debug!(command = cmd, "execute command");
    match cmd {
      "projects" => self.reset_to_home(),
      "admins" => {
        if self.ctx.is_system_admin() {
          self.view_stack.truncate(1);
          self.push(Box::new(AdminListView::new(&self.ctx)));
        } else {
          self.set_status("Only system administrators can manage admins");
        }
      }
      "logout" => {
        self.ctx.sessions.clear();
        self.ctx.projects.clear_cache();
        self.ctx.projects.invalidate_dashboard_data();
        self.ctx.session = Err(ApiError::new("Signed out"));
        info!("signed out");
        self.reset_to_home();
      }
      "quit" => self.should_quit = true,
      "" => {}
      other => self.set_status(format!("Unknown command: {}", other)),
    }
  }
}

fn restore_terminal() -> Result<()> {
  disable_raw_mode()?;
  stdout().execute(LeaveAlternateScreen)?;
  Ok(())
}

/// Run `body`, then `restore` whatever the outcome. The body's error wins
/// over a restore error.
async fn with_restore<T>(
  body: impl std::future::Future<Output = Result<T>>,
  restore: impl FnOnce() -> Result<()>,
) -> Result<T> {
  let result = body.await;
  let restored = restore();
  let value = result?;
  restored?;
  Ok(value)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::testing::{project, FakeApi};
  use crate::context::test_context;
  use std::sync::Arc;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn run_command(app: &mut App, cmd: &str) {
    app.handle_key(key(KeyCode::Char(':')));
    for c in cmd.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
  }

  fn api() -> Arc<FakeApi> {
    Arc::new(FakeApi::with_projects(vec![project("123", "Coral Reef Survey")]))
  }

  #[tokio::test]
  async fn test_starts_on_dashboard_and_opens_project() {
    let app = App::new(test_context(api(), false), Some("123".to_string()));
    assert_eq!(app.breadcrumb(), vec!["Projects", "123"]);
  }

  #[tokio::test]
  async fn test_admins_command_requires_admin() {
    let mut app = App::new(test_context(api(), false), None);
    run_command(&mut app, "admins");
    assert_eq!(app.breadcrumb(), vec!["Projects"]);
    assert!(app.status().is_some());

    let mut app = App::new(test_context(api(), true), None);
    run_command(&mut app, "admins");
    assert_eq!(app.breadcrumb(), vec!["Projects", "Admins"]);
  }

  #[tokio::test]
  async fn test_pop_on_root_quits() {
    let mut app = App::new(test_context(api(), false), Some("123".to_string()));
    app.handle_key(key(KeyCode::Char('q')));
    assert_eq!(app.breadcrumb(), vec!["Projects"]);
    assert!(!app.should_quit);

    app.handle_key(key(KeyCode::Char('q')));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_logout_shows_landing() {
    let mut app = App::new(test_context(api(), true), None);
    run_command(&mut app, "logout");
    assert_eq!(app.breadcrumb(), vec!["Sign in"]);
    assert!(app.ctx().user().is_none());
  }

  #[tokio::test]
  async fn test_restore_runs_when_setup_fails() {
    let restored = std::cell::Cell::new(false);
    let result: Result<()> = with_restore(
      async { Err(color_eyre::eyre::eyre!("no terminal")) },
      || {
        restored.set(true);
        Ok(())
      },
    )
    .await;

    assert!(restored.get());
    assert_eq!(result.unwrap_err().to_string(), "no terminal");
  }

  #[tokio::test]
  async fn test_restore_error_surfaces_after_success() {
    let result = with_restore(async { Ok::<_, color_eyre::Report>(1) }, || {
      Err(color_eyre::eyre::eyre!("tty gone"))
    })
    .await;
    assert_eq!(result.unwrap_err().to_string(), "tty gone");

    let result = with_restore(async { Ok::<_, color_eyre::Report>(2) }, || Ok(())).await;
    assert_eq!(result.unwrap(), 2);
  }

  #[tokio::test]
  async fn test_unknown_command_sets_status() {
    let mut app = App::new(test_context(api(), false), None);
    run_command(&mut app, "frobnicate");
    assert_eq!(app.status(), Some("Unknown command: frobnicate"));
  }
}
