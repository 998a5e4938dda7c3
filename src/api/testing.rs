//! In-memory `ApiClient` for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{
  Language, NewProject, NewSystemAdmin, Project, ProjectRequest, SystemAdmin, TimelineItem,
  TitleKind, UserSession,
};
use crate::api::ApiClient;

#[derive(Default)]
pub struct FakeApi {
  pub projects: Mutex<Vec<Project>>,
  pub admins: Mutex<Vec<SystemAdmin>>,
  pub session: Mutex<Option<UserSession>>,
  /// Project ids whose fetch fails with a 500
  pub failing_projects: Mutex<HashSet<String>>,
  pub fail_timeline: Mutex<bool>,
  pub fail_list: Mutex<bool>,
  /// Artificial latency applied to project fetches
  pub delay: Mutex<Option<Duration>>,
  pub project_calls: AtomicUsize,
  pub list_calls: AtomicUsize,
  pub session_calls: AtomicUsize,
  next_id: AtomicUsize,
}

pub fn project(id: &str, title: &str) -> Project {
  Project::placeholder(id).with_primary_title(title)
}

pub fn session(admin: bool) -> UserSession {
  UserSession {
    user_id: "u1".to_string(),
    name: "Test User".to_string(),
    email: "test@example.org".to_string(),
    system_admin: admin,
  }
}

impl FakeApi {
  pub fn with_projects(projects: Vec<Project>) -> Self {
    Self {
      projects: Mutex::new(projects),
      ..Self::default()
    }
  }

  pub fn fail_project(&self, id: &str) {
    self.failing_projects.lock().unwrap().insert(id.to_string());
  }

  pub fn set_delay(&self, delay: Duration) {
    *self.delay.lock().unwrap() = Some(delay);
  }

  pub fn project_calls(&self) -> usize {
    self.project_calls.load(Ordering::SeqCst)
  }

  fn timeline_for(id: &str) -> Vec<TimelineItem> {
    vec![TimelineItem {
      timestamp: chrono::Utc::now(),
      actor: Some("system".to_string()),
      message: format!("Project {} created", id),
    }]
  }
}

#[async_trait]
impl ApiClient for FakeApi {
  async fn user_session(&self) -> ApiResult<UserSession> {
    self.session_calls.fetch_add(1, Ordering::SeqCst);
    let session = self.session.lock().unwrap().clone();
    session.ok_or_else(|| ApiError::from_response(401, r#"{"message": "Not signed in"}"#))
  }

  async fn list_projects(&self) -> ApiResult<Vec<Project>> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    if *self.fail_list.lock().unwrap() {
      return Err(ApiError::from_response(503, "unavailable"));
    }
    Ok(self.projects.lock().unwrap().clone())
  }

  async fn get_project(&self, id: &str) -> ApiResult<Project> {
    self.project_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *self.delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    if self.failing_projects.lock().unwrap().contains(id) {
      return Err(ApiError::from_response(500, r#"{"message": "boom"}"#));
    }
    self
      .projects
      .lock()
      .unwrap()
      .iter()
      .find(|p| p.id == id)
      .cloned()
      .ok_or_else(|| ApiError::from_response(404, r#"{"message": "Project not found"}"#))
  }

  async fn get_project_timeline(&self, id: &str) -> ApiResult<Vec<TimelineItem>> {
    if *self.fail_timeline.lock().unwrap() {
      return Err(ApiError::from_response(500, "timeline unavailable"));
    }
    Ok(Self::timeline_for(id))
  }

  async fn create_project(&self, project: NewProject) -> ApiResult<Project> {
    let id = format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
    let created = Project::placeholder(&id).with_primary_title(&project.primary_title);
    self.projects.lock().unwrap().push(created.clone());
    Ok(created)
  }

  async fn update_project(&self, id: &str, request: ProjectRequest) -> ApiResult<Project> {
    let mut projects = self.projects.lock().unwrap();
    let existing = projects
      .iter_mut()
      .find(|p| p.id == id)
      .ok_or_else(|| ApiError::from_response(404, ""))?;
    if let Some(title) = request.titles.iter().find(|t| t.kind == TitleKind::Primary) {
      *existing = existing.clone().with_primary_title(&title.text);
    }
    Ok(existing.clone())
  }

  async fn delete_project(&self, id: &str) -> ApiResult<()> {
    self.projects.lock().unwrap().retain(|p| p.id != id);
    Ok(())
  }

  async fn list_system_admins(&self) -> ApiResult<Vec<SystemAdmin>> {
    Ok(self.admins.lock().unwrap().clone())
  }

  async fn add_system_admin(&self, admin: NewSystemAdmin) -> ApiResult<SystemAdmin> {
    if !admin.email.contains('@') {
      return Err(ApiError::from_response(
        422,
        r#"{"message": "Invalid email address"}"#,
      ));
    }
    let created = SystemAdmin {
      id: format!("a{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
      email: admin.email,
      name: None,
    };
    self.admins.lock().unwrap().push(created.clone());
    Ok(created)
  }

  async fn remove_system_admin(&self, id: &str) -> ApiResult<()> {
    self.admins.lock().unwrap().retain(|a| a.id != id);
    Ok(())
  }

  async fn list_languages(&self) -> ApiResult<Vec<Language>> {
    Ok(vec![
      Language {
        code: "en".to_string(),
        name: "English".to_string(),
      },
      Language {
        code: "nl".to_string(),
        name: "Dutch".to_string(),
      },
    ])
  }
}
