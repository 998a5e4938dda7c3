use crate::api::types::{NewProject, Project};
use crate::cache::CacheResult;
use crate::context::AppContext;
use crate::mutation::Mutation;
use crate::query::{Query, QueryState};
use crate::ui::components::{
  FilterEvent, FilterInput, KeyResult, Picker, PickerEvent, PickerItem, Prompt, PromptEvent,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_date, source_label, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::ProjectDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::info;

/// Project dashboard: every project the user can see
pub struct DashboardView {
  ctx: AppContext,
  query: Query<CacheResult<Vec<Project>>>,
  list_state: ListState,
  filter: FilterInput,
  prompt: Prompt,
  picker: Picker,
  create: Mutation<NewProject, Project>,
  /// Title typed into the prompt while the language is being picked
  pending_title: Option<String>,
  /// Select this project once the list reloads
  select_after_load: Option<String>,
  dashboard_version: u64,
  /// Last id handed to the preloader; reset when a detail view consumes the cache
  last_preloaded: Option<String>,
}

impl DashboardView {
  pub fn new(ctx: AppContext) -> Self {
    let cache = ctx.projects.clone();
    let mut query = Query::new(move || {
      let cache = cache.clone();
      async move { cache.load_dashboard().await }
    })
    .keep_previous_data();
    query.fetch();

    let cache = ctx.projects.clone();
    let create = Mutation::new(ctx.api.clone(), |api, project: NewProject| async move {
      api.create_project(project).await
    })
    .on_success(move |project: &Project| {
      info!(project_id = %project.id, "project created");
      cache.invalidate_dashboard_data();
    });

    Self {
      dashboard_version: ctx.projects.dashboard_version(),
      ctx,
      query,
      list_state: ListState::default(),
      filter: FilterInput::new(),
      prompt: Prompt::new(),
      picker: Picker::new(),
      create,
      pending_title: None,
      select_after_load: None,
      last_preloaded: None,
    }
  }

  /// Projects passing the current filter
  fn visible(&self) -> Vec<&Project> {
    self
      .query
      .data()
      .map(|result| {
        result
          .data
          .iter()
          .filter(|p| self.filter.matches(p.display_title()) || self.filter.matches(&p.id))
          .collect()
      })
      .unwrap_or_default()
  }

  fn selected_id(&self) -> Option<String> {
    let idx = self.list_state.selected()?;
    self.visible().get(idx).map(|p| p.id.clone())
  }

  /// Warm the cache for the highlighted project so opening it is instant
  fn preload_selected(&mut self) {
    let Some(id) = self.selected_id() else {
      return;
    };
    if self.last_preloaded.as_deref() == Some(id.as_str()) {
      return;
    }
    self.ctx.projects.spawn_preload(id.clone());
    self.last_preloaded = Some(id);
  }

  fn move_selection(&mut self, down: bool) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);
    if len == 0 {
      return;
    }
    if down {
      self.list_state.select_next();
    } else {
      self.list_state.select_previous();
    }
    ensure_valid_selection(&mut self.list_state, len);
    self.preload_selected();
  }

  fn refresh(&mut self) {
    self.ctx.projects.invalidate_dashboard_data();
    self.dashboard_version = self.ctx.projects.dashboard_version();
    self.query.refetch();
  }

  fn open_selected(&mut self) -> ViewAction {
    let Some(idx) = self.list_state.selected() else {
      return ViewAction::None;
    };
    let siblings: Vec<String> = self.visible().iter().map(|p| p.id.clone()).collect();
    if idx >= siblings.len() {
      return ViewAction::None;
    }
    // The detail view consumes the cache, so warm the row again on return
    self.last_preloaded = None;
    ViewAction::Push(Box::new(ProjectDetailView::new(
      self.ctx.clone(),
      siblings,
      idx,
    )))
  }

  fn submit_create(&mut self, title: String, language: Option<String>) -> ViewAction {
    let started = self.create.submit(NewProject {
      primary_title: title,
      language,
    });
    if started {
      ViewAction::Status("Creating project...".to_string())
    } else {
      ViewAction::Status("A project is already being created".to_string())
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);

    let filter_note = if self.filter.query().is_empty() {
      String::new()
    } else {
      format!(" /{}", self.filter.query())
    };
    let title = match self.query.state() {
      QueryState::Loading if self.query.is_previous_data() => {
        format!(" Projects ({}){} refreshing... ", len, filter_note)
      }
      QueryState::Error(e) if self.query.is_previous_data() => {
        format!(" Projects ({}){} refresh failed: {} ", len, filter_note, e)
      }
      QueryState::Idle | QueryState::Loading => " Projects (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Projects (error: {}) ", e),
      QueryState::Success(result) => format!(
        " Projects ({}){}{} ",
        len,
        filter_note,
        source_label(result.source, result.cached_at)
      ),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 {
      let content = match self.query.state() {
        QueryState::Idle | QueryState::Loading => "Loading projects...",
        QueryState::Error(_) => "Failed to load projects. Press 'r' to retry.",
        QueryState::Success(_) if !self.filter.query().is_empty() => {
          "No projects match the filter."
        }
        QueryState::Success(_) => "No projects yet. Press 'n' to create one.",
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let title_width = (area.width as usize).saturating_sub(60).max(20);
    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|project| {
        let lead = project.lead().map(|c| c.name.as_str()).unwrap_or("-");
        let line = Line::from(vec![
          Span::styled(
            format!("{:<10}", truncate(&project.id, 10)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::raw(format!(
            "{:<width$}",
            truncate(project.display_title(), title_width),
            width = title_width
          )),
          Span::raw(" "),
          Span::styled(
            format!("{:<20}", truncate(lead, 20)),
            Style::default().fg(Color::Yellow),
          ),
          Span::styled(
            format!(
              " {} → {}",
              format_date(project.start_date),
              format_date(project.end_date)
            ),
            Style::default().fg(Color::DarkGray),
          ),
        ]);
        ListItem::new(line)
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

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(title)) => {
        if self.ctx.languages.is_empty() {
          return self.submit_create(title, None);
        }
        let items = self
          .ctx
          .languages
          .iter()
          .map(|l| PickerItem::new(&l.code, &l.name))
          .collect();
        self.picker.show("Title language", items);
        self.pending_title = Some(title);
        return ViewAction::None;
      }
      KeyResult::Event(PromptEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match self.picker.handle_key(key) {
      KeyResult::Event(PickerEvent::Selected(code)) => {
        return match self.pending_title.take() {
          Some(title) => self.submit_create(title, Some(code)),
          None => ViewAction::None,
        };
      }
      KeyResult::Event(PickerEvent::Cancelled) => {
        self.pending_title = None;
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match self.filter.handle_key(key) {
      KeyResult::Event(FilterEvent::Changed(_)) => {
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::Event(FilterEvent::Applied) | KeyResult::Handled => {
        self.preload_selected();
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_selection(true),
      KeyCode::Char('k') | KeyCode::Up => self.move_selection(false),
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('n') => self.prompt.show("New project title", ""),
      KeyCode::Enter => return self.open_selected(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.filter.render_overlay(frame, area);
    self.prompt.render_overlay(frame, area);
    self.picker.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Projects".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    // Another view wrote to a project; the list may be out of date
    let version = self.ctx.projects.dashboard_version();
    if version != self.dashboard_version {
      self.dashboard_version = version;
      self.query.refetch();
    }

    if self.query.poll() && self.query.is_success() {
      if let Some(id) = self.select_after_load.take() {
        let idx = self.visible().iter().position(|p| p.id == id);
        if idx.is_some() {
          self.list_state.select(idx);
        }
      }
      let len = self.visible().len();
      ensure_valid_selection(&mut self.list_state, len);
    }
    // No-op unless the highlighted row changed or a detail view consumed the cache
    self.preload_selected();

    if self.create.poll() {
      // on_success already bumped the dashboard version, so the list reloads
      if let Some(project) = self.create.result() {
        self.select_after_load = Some(project.id.clone());
        return ViewAction::Status(format!("Created {}", project.display_title()));
      }
      if let Some(error) = self.create.error() {
        return ViewAction::Status(format!("Create failed: {}", error));
      }
    }

    ViewAction::None
  }

  fn is_capturing_input(&self) -> bool {
    self.filter.is_active() || self.prompt.is_active() || self.picker.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "filter").with_priority(20),
      ShortcutInfo::new("n", "new").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("enter", "open").with_priority(50),
    ]
  }
}
