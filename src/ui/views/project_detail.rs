use crate::api::types::{Project, ProjectRequest, TimelineItem};
use crate::cache::{fetch_project_detail, CacheSource};
use crate::context::AppContext;
use crate::mutation::Mutation;
use crate::query::{Query, QueryState};
use crate::ui::components::{KeyResult, Prompt, PromptEvent};
use crate::ui::renderfns::{format_date, source_label};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs, Wrap};
use tracing::{debug, info};

/// Everything the detail screen shows for one project
#[derive(Debug, Clone)]
pub struct ProjectDetail {
  pub project: Project,
  /// `None` when the data came from a cache entry written without a timeline
  pub timeline: Option<Vec<TimelineItem>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
  Overview,
  Contributors,
  Products,
  Organisations,
  Timeline,
}

impl Tab {
  const ALL: [Tab; 5] = [
    Tab::Overview,
    Tab::Contributors,
    Tab::Products,
    Tab::Organisations,
    Tab::Timeline,
  ];

  fn title(self) -> &'static str {
    match self {
      Tab::Overview => "Overview",
      Tab::Contributors => "Contributors",
      Tab::Products => "Products",
      Tab::Organisations => "Organisations",
      Tab::Timeline => "Timeline",
    }
  }

  fn index(self) -> usize {
    Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
  }

  fn offset(self, by: isize) -> Tab {
    let len = Self::ALL.len() as isize;
    Self::ALL[(self.index() as isize + by).rem_euclid(len) as usize]
  }
}

/// Input to the rename mutation: project as last seen plus the new title
type Rename = (Project, String);

/// Detail screen for one project, with `[`/`]` to step through the list it
/// was opened from
pub struct ProjectDetailView {
  ctx: AppContext,
  siblings: Vec<String>,
  position: usize,
  query: Query<ProjectDetail, String>,
  /// When the cache entry now on screen was written; `None` once fetched
  cached_at: Option<DateTime<Utc>>,
  tab: Tab,
  scroll: u16,
  prompt: Prompt,
  rename: Mutation<Rename, Project>,
}

impl ProjectDetailView {
  pub fn new(ctx: AppContext, siblings: Vec<String>, position: usize) -> Self {
    let id = siblings.get(position).cloned().unwrap_or_default();

    let api = ctx.api.clone();
    let query = Query::with_deps(id.clone(), move |id: String| {
      let api = api.clone();
      async move {
        let (project, timeline) = fetch_project_detail(api.as_ref(), &id).await?;
        Ok(ProjectDetail {
          project,
          timeline: Some(timeline),
        })
      }
    });

    let cache = ctx.projects.clone();
    let rename = Mutation::new(ctx.api.clone(), |api, (project, title): Rename| async move {
      let request = ProjectRequest::from(&project.clone().with_primary_title(&title));
      api.update_project(&project.id, request).await
    })
    .on_success(move |project: &Project| {
      info!(project_id = %project.id, "project renamed");
      cache.invalidate_dashboard_data();
    });

    let mut view = Self {
      ctx,
      siblings,
      position,
      query,
      cached_at: None,
      tab: Tab::Overview,
      scroll: 0,
      prompt: Prompt::new(),
      rename,
    };
    view.open(id);
    view
  }

  /// Show a project: take it from the cache if a preload finished, otherwise
  /// fetch it.
  fn open(&mut self, id: String) {
    self.scroll = 0;
    match self.ctx.projects.consume_cached_project(&id) {
      Some(entry) if !entry.is_loading => {
        debug!(project_id = %id, "opening project from cache");
        self.cached_at = Some(entry.cached_at);
        self.query.prime(
          id,
          ProjectDetail {
            project: entry.data,
            timeline: entry.timeline,
          },
        );
      }
      _ => {
        self.cached_at = None;
        if !self.query.set_deps(id) {
          self.query.refetch();
        }
      }
    }
    self.preload_neighbour();
  }

  /// Warm the cache for the next project in the list
  fn preload_neighbour(&self) {
    if let Some(next) = self.siblings.get(self.position + 1) {
      self.ctx.projects.spawn_preload(next.clone());
    }
  }

  fn step(&mut self, forward: bool) {
    let target = if forward {
      self.position + 1
    } else {
      match self.position.checked_sub(1) {
        Some(p) => p,
        None => return,
      }
    };
    if let Some(id) = self.siblings.get(target).cloned() {
      self.position = target;
      self.open(id);
    }
  }

  fn project_id(&self) -> &str {
    self.query.deps()
  }

  fn project(&self) -> Option<&Project> {
    self.query.data().map(|d| &d.project)
  }

  fn start_rename(&mut self) {
    if let Some(project) = self.project() {
      let current = project.display_title().to_string();
      self.prompt.show("Primary title", &current);
    }
  }

  fn render_overview<'a>(&'a self, detail: &'a ProjectDetail) -> Vec<Line<'a>> {
    let project = &detail.project;
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
      Line::from(vec![
        Span::styled("Id:       ", label),
        Span::styled(&project.id, Style::default().fg(Color::Cyan)),
      ]),
      Line::from(vec![
        Span::styled("Lead:     ", label),
        Span::raw(project.lead().map(|c| c.name.as_str()).unwrap_or("-")),
      ]),
      Line::from(vec![
        Span::styled("Period:   ", label),
        Span::raw(format!(
          "{} → {}",
          format_date(project.start_date),
          format_date(project.end_date)
        )),
      ]),
      Line::from(vec![
        Span::styled("Updated:  ", label),
        Span::raw(
          project
            .updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string()),
        ),
      ]),
      Line::raw(""),
      Line::styled("Titles", Style::default().fg(Color::Yellow).bold()),
    ];

    for title in &project.titles {
      let language = title
        .language
        .as_deref()
        .map(|code| self.ctx.language_name(code))
        .unwrap_or("-");
      lines.push(Line::from(vec![
        Span::styled(format!("  {:<12}", format!("{:?}", title.kind)), label),
        Span::raw(&title.text),
        Span::styled(format!("  ({})", language), label),
      ]));
    }

    lines.push(Line::raw(""));
    lines.push(Line::styled(
      "Descriptions",
      Style::default().fg(Color::Yellow).bold(),
    ));
    if project.descriptions.is_empty() {
      lines.push(Line::styled("  none", label));
    }
    for description in &project.descriptions {
      lines.push(Line::styled(
        format!("  {:?}", description.kind),
        label,
      ));
      lines.push(Line::raw(format!("    {}", description.text)));
    }

    lines
  }

  fn render_tab<'a>(&'a self, detail: &'a ProjectDetail) -> Vec<Line<'a>> {
    let project = &detail.project;
    let dim = Style::default().fg(Color::DarkGray);
    let empty = |what: &str| vec![Line::styled(format!("No {}.", what), dim)];

    match self.tab {
      Tab::Overview => self.render_overview(detail),
      Tab::Contributors if project.contributors.is_empty() => empty("contributors"),
      Tab::Contributors => project
        .contributors
        .iter()
        .map(|c| {
          Line::from(vec![
            Span::styled(
              if c.leader { "★ " } else { "  " },
              Style::default().fg(Color::Yellow),
            ),
            Span::raw(format!("{:<30}", c.name)),
            Span::styled(format!("{:<30}", c.roles.join(", ")), dim),
            Span::styled(c.orcid.as_deref().unwrap_or(""), Style::default().fg(Color::Cyan)),
          ])
        })
        .collect(),
      Tab::Products if project.products.is_empty() => empty("products"),
      Tab::Products => project
        .products
        .iter()
        .map(|p| {
          Line::from(vec![
            Span::styled(format!("{:<16}", p.kind), dim),
            Span::raw(format!("{:<40} ", p.title)),
            Span::styled(p.url.as_deref().unwrap_or(""), Style::default().fg(Color::Cyan)),
          ])
        })
        .collect(),
      Tab::Organisations if project.organisations.is_empty() => empty("organisations"),
      Tab::Organisations => project
        .organisations
        .iter()
        .map(|o| {
          Line::from(vec![
            Span::raw(format!("{:<40}", o.name)),
            Span::styled(format!("{:<16}", o.role), dim),
            Span::styled(o.ror.as_deref().unwrap_or(""), Style::default().fg(Color::Cyan)),
          ])
        })
        .collect(),
      Tab::Timeline => match &detail.timeline {
        None => vec![Line::styled("Timeline not loaded. Press 'r' to fetch it.", dim)],
        Some(items) if items.is_empty() => empty("timeline entries"),
        Some(items) => items
          .iter()
          .map(|item| {
            Line::from(vec![
              Span::styled(
                item.timestamp.format("%Y-%m-%d %H:%M  ").to_string(),
                dim,
              ),
              Span::styled(
                format!("{:<16}", item.actor.as_deref().unwrap_or("-")),
                Style::default().fg(Color::Yellow),
              ),
              Span::raw(&item.message),
            ])
          })
          .collect(),
      },
    }
  }
}

impl View for ProjectDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(title)) => {
        let Some(project) = self.project().cloned() else {
          return ViewAction::None;
        };
        if project.display_title() == title {
          return ViewAction::None;
        }
        return if self.rename.submit((project, title)) {
          ViewAction::Status("Saving title...".to_string())
        } else {
          ViewAction::Status("A save is already in progress".to_string())
        };
      }
      KeyResult::Event(PromptEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => {
        self.tab = self.tab.offset(1);
        self.scroll = 0;
      }
      KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => {
        self.tab = self.tab.offset(-1);
        self.scroll = 0;
      }
      KeyCode::Char(c @ '1'..='5') => {
        let idx = c as usize - '1' as usize;
        self.tab = Tab::ALL[idx];
        self.scroll = 0;
      }
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char(']') => self.step(true),
      KeyCode::Char('[') => self.step(false),
      KeyCode::Char('r') => {
        self.cached_at = None;
        self.query.refetch();
      }
      KeyCode::Char('e') => self.start_rename(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(2), // Title line + tabs
        Constraint::Min(0),
      ])
      .split(area);

    let title = self
      .project()
      .map(|p| p.display_title().to_string())
      .unwrap_or_else(|| self.project_id().to_string());
    let mut heading = vec![
      Span::styled(
        format!(" {} ", self.project_id()),
        Style::default().fg(Color::Cyan).bold(),
      ),
      Span::styled(title, Style::default().fg(Color::White).bold()),
    ];
    if self.siblings.len() > 1 {
      heading.push(Span::styled(
        format!("  [{}/{}]", self.position + 1, self.siblings.len()),
        Style::default().fg(Color::DarkGray),
      ));
    }
    if let Some(at) = self.cached_at {
      heading.push(Span::styled(
        format!(" {}", source_label(CacheSource::CacheFresh, Some(at))),
        Style::default().fg(Color::DarkGray),
      ));
    }
    if self.rename.is_loading() {
      heading.push(Span::styled("  saving...", Style::default().fg(Color::Yellow)));
    }

    let tabs = Tabs::new(Tab::ALL.iter().map(|t| t.title()))
      .select(self.tab.index())
      .style(Style::default().fg(Color::DarkGray))
      .highlight_style(Style::default().fg(Color::Yellow).bold());

    let header_rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Length(1)])
      .split(chunks[0]);
    frame.render_widget(Paragraph::new(Line::from(heading)), header_rows[0]);
    frame.render_widget(tabs, header_rows[1]);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue))
      .title(format!(" {} ", self.tab.title()));

    let body = match self.query.state() {
      QueryState::Idle | QueryState::Loading => {
        Paragraph::new("Loading project...").style(Style::default().fg(Color::DarkGray))
      }
      QueryState::Error(e) if e.is_not_found() => Paragraph::new("Project not found.")
        .style(Style::default().fg(Color::Red)),
      QueryState::Error(e) => Paragraph::new(format!("Failed to load project: {}\nPress 'r' to retry.", e))
        .style(Style::default().fg(Color::Red)),
      QueryState::Success(detail) => Paragraph::new(self.render_tab(detail))
        .wrap(Wrap { trim: false })
        .scroll((self.scroll, 0)),
    };
    frame.render_widget(body.block(block), chunks[1]);

    self.prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.project_id().to_string()
  }

  fn tick(&mut self) -> ViewAction {
    if self.query.poll() {
      if let Some(detail) = self.query.data() {
        self.ctx.projects.update_cache(
          &detail.project.id,
          detail.project.clone(),
          detail.timeline.clone(),
        );
      }
    }

    if self.rename.poll() {
      if let Some(updated) = self.rename.result().cloned() {
        let timeline = self.query.data().and_then(|d| d.timeline.clone());
        self
          .ctx
          .projects
          .update_cache(&updated.id, updated.clone(), timeline.clone());
        // The user may have stepped to a sibling while the save was running
        if updated.id == self.project_id() {
          let id = updated.id.clone();
          let title = updated.display_title().to_string();
          self.cached_at = None;
          self.query.prime(
            id,
            ProjectDetail {
              project: updated,
              timeline,
            },
          );
          return ViewAction::Status(format!("Saved \"{}\"", title));
        }
        return ViewAction::Status("Saved".to_string());
      }
      if let Some(error) = self.rename.error() {
        return ViewAction::Status(format!("Save failed: {}", error));
      }
    }

    ViewAction::None
  }

  fn is_capturing_input(&self) -> bool {
    self.prompt.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("tab", "section").with_priority(20),
      ShortcutInfo::new("[ ]", "prev/next").with_priority(30),
      ShortcutInfo::new("e", "edit title").with_priority(40),
      ShortcutInfo::new("r", "reload").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::testing::{project, FakeApi};
  use crate::context::test_context;
  use crossterm::event::KeyModifiers;
  use std::sync::Arc;
  use std::time::Duration;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn fake_api() -> Arc<FakeApi> {
    Arc::new(FakeApi::with_projects(vec![
      project("123", "Coral Reef Survey"),
      project("456", "Glacier Monitoring"),
    ]))
  }

  fn ids() -> Vec<String> {
    vec!["123".to_string(), "456".to_string()]
  }

  async fn settle(view: &mut ProjectDetailView) -> Vec<ViewAction> {
    let mut actions = Vec::new();
    for _ in 0..5 {
      tokio::time::sleep(Duration::from_millis(10)).await;
      actions.push(view.tick());
    }
    actions
  }

  #[tokio::test]
  async fn test_cache_hit_renders_without_loading() {
    let api = fake_api();
    let ctx = test_context(api.clone(), false);
    ctx.projects.preload_project("123").await;
    let calls = api.project_calls();

    let view = ProjectDetailView::new(ctx.clone(), ids(), 0);

    assert!(view.cached_at.is_some());
    assert!(!view.query.is_loading());
    assert_eq!(view.project().map(|p| p.display_title()), Some("Coral Reef Survey"));
    // Opening did not fetch "123" again (only the neighbour preload may run)
    assert!(api.project_calls() <= calls + 1);
  }

  #[tokio::test]
  async fn test_cache_miss_fetches_and_stores() {
    let api = fake_api();
    let ctx = test_context(api.clone(), false);
    let mut view = ProjectDetailView::new(ctx.clone(), vec!["123".to_string()], 0);

    assert!(view.query.is_loading());
    settle(&mut view).await;

    assert!(view.cached_at.is_none());
    let detail = view.query.data().unwrap();
    assert_eq!(detail.timeline.as_ref().map(|t| t.len()), Some(1));
    assert!(ctx.projects.get_cached_project("123").is_some());
  }

  #[tokio::test]
  async fn test_missing_project_is_not_found() {
    let ctx = test_context(fake_api(), false);
    let mut view = ProjectDetailView::new(ctx, vec!["999".to_string()], 0);
    settle(&mut view).await;

    assert!(view.query.error().is_some_and(|e| e.is_not_found()));
  }

  #[tokio::test]
  async fn test_step_to_sibling() {
    let ctx = test_context(fake_api(), false);
    let mut view = ProjectDetailView::new(ctx, ids(), 0);
    settle(&mut view).await;

    view.handle_key(key(KeyCode::Char(']')));
    settle(&mut view).await;
    assert_eq!(view.project_id(), "456");
    assert_eq!(view.project().map(|p| p.display_title()), Some("Glacier Monitoring"));

    // Already at the end
    view.handle_key(key(KeyCode::Char(']')));
    assert_eq!(view.project_id(), "456");

    view.handle_key(key(KeyCode::Char('[')));
    settle(&mut view).await;
    assert_eq!(view.project_id(), "123");
  }

  #[tokio::test]
  async fn test_rename_updates_view_cache_and_dashboard() {
    let api = fake_api();
    let ctx = test_context(api.clone(), false);
    ctx.projects.set_cached_dashboard_data(vec![project("123", "Coral Reef Survey")]);
    let mut view = ProjectDetailView::new(ctx.clone(), vec!["123".to_string()], 0);
    settle(&mut view).await;

    view.handle_key(key(KeyCode::Char('e')));
    assert!(view.is_capturing_input());
    view.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
    for c in "Reef Survey 2".chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    view.handle_key(key(KeyCode::Enter));

    let actions = settle(&mut view).await;
    assert!(actions
      .iter()
      .any(|a| matches!(a, ViewAction::Status(msg) if msg == "Saved \"Reef Survey 2\"")));
    assert_eq!(view.project().map(|p| p.display_title()), Some("Reef Survey 2"));

    let cached = ctx.projects.get_cached_project("123").unwrap();
    assert_eq!(cached.data.display_title(), "Reef Survey 2");
    assert!(cached.timeline.is_some());
    assert!(ctx.projects.get_cached_dashboard_data().is_none());
  }

  #[tokio::test]
  async fn test_tabs_wrap() {
    let ctx = test_context(fake_api(), false);
    let mut view = ProjectDetailView::new(ctx, ids(), 0);

    view.handle_key(key(KeyCode::BackTab));
    assert_eq!(view.tab, Tab::Timeline);
    view.handle_key(key(KeyCode::Tab));
    assert_eq!(view.tab, Tab::Overview);
    view.handle_key(key(KeyCode::Char('3')));
    assert_eq!(view.tab, Tab::Products);
  }
}
