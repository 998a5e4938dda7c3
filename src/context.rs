use std::sync::Arc;

use tracing::warn;

use crate::api::types::{Language, UserSession};
use crate::api::{ApiClient, ApiError, ApiResult};
use crate::cache::ProjectCache;
use crate::config::Config;
use crate::session::SessionStore;

/// Everything views need from the app root, cloned into each view.
#[derive(Clone)]
pub struct AppContext {
  pub api: Arc<dyn ApiClient>,
  pub projects: ProjectCache,
  pub sessions: SessionStore,
  /// The signed-in user, or why there is none
  pub session: Result<UserSession, ApiError>,
  pub languages: Arc<Vec<Language>>,
  pub config: Arc<Config>,
}

impl AppContext {
  /// Build the context: establish the session and load reference data.
  pub async fn init(api: Arc<dyn ApiClient>, sessions: SessionStore, config: Config) -> Self {
    let projects = ProjectCache::new(Arc::clone(&api), &config.cache);
    let signed_in = Self::sign_in(Arc::clone(&api), sessions.clone()).await;

    let mut ctx = Self {
      api,
      projects,
      sessions,
      session: Err(ApiError::new("Not signed in")),
      languages: Arc::new(Vec::new()),
      config: Arc::new(config),
    };
    ctx.apply_sign_in(signed_in);
    ctx
  }

  /// Establish the session, then fetch the language list.
  ///
  /// Owns its arguments so it can run inside a retry `Query`.
  pub async fn sign_in(
    api: Arc<dyn ApiClient>,
    sessions: SessionStore,
  ) -> ApiResult<(UserSession, Vec<Language>)> {
    let session = sessions.establish(api.as_ref()).await?;
    let languages = match api.list_languages().await {
      Ok(languages) => languages,
      Err(e) => {
        warn!(error = %e, "failed to load languages");
        Vec::new()
      }
    };
    Ok((session, languages))
  }

  pub fn apply_sign_in(&mut self, result: ApiResult<(UserSession, Vec<Language>)>) {
    match result {
      Ok((session, languages)) => {
        self.session = Ok(session);
        self.languages = Arc::new(languages);
      }
      Err(e) => self.session = Err(e),
    }
  }

  pub fn user(&self) -> Option<&UserSession> {
    self.session.as_ref().ok()
  }

  pub fn is_system_admin(&self) -> bool {
    self.user().is_some_and(|u| u.system_admin)
  }

  pub fn language_name<'a>(&'a self, code: &'a str) -> &'a str {
    self
      .languages
      .iter()
      .find(|l| l.code == code)
      .map(|l| l.name.as_str())
      .unwrap_or(code)
  }
}

/// A signed-in context over the given API, without touching disk.
#[cfg(test)]
pub fn test_context(api: Arc<dyn ApiClient>, admin: bool) -> AppContext {
  use crate::api::testing::session;

  let config = Config::from_yaml("api:\n  base_url: http://localhost\n").unwrap();
  let dir = std::env::temp_dir().join("conflux-test-sessions");
  AppContext {
    projects: ProjectCache::new(Arc::clone(&api), &config.cache),
    api,
    sessions: SessionStore::new(&dir, 30),
    session: Ok(session(admin)),
    languages: Arc::new(vec![
      Language {
        code: "en".to_string(),
        name: "English".to_string(),
      },
      Language {
        code: "nl".to_string(),
        name: "Dutch".to_string(),
      },
    ]),
    config: Arc::new(config),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::testing::{session, FakeApi};

  fn config() -> Config {
    Config::from_yaml("api:\n  base_url: http://localhost\n").unwrap()
  }

  #[tokio::test]
  async fn test_init_with_session() {
    let dir = tempfile::tempdir().unwrap();
    let api = FakeApi::default();
    *api.session.lock().unwrap() = Some(session(true));

    let ctx = AppContext::init(Arc::new(api), SessionStore::new(dir.path(), 30), config()).await;

    assert!(ctx.is_system_admin());
    assert_eq!(ctx.languages.len(), 2);
    assert_eq!(ctx.language_name("nl"), "Dutch");
    assert_eq!(ctx.language_name("xx"), "xx");
  }

  #[tokio::test]
  async fn test_init_without_session_then_sign_in() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeApi::default());

    let mut ctx =
      AppContext::init(api.clone(), SessionStore::new(dir.path(), 30), config()).await;
    assert!(ctx.user().is_none());
    assert!(ctx.languages.is_empty());

    *api.session.lock().unwrap() = Some(session(false));
    let result = AppContext::sign_in(api.clone(), ctx.sessions.clone()).await;
    ctx.apply_sign_in(result);

    assert!(ctx.user().is_some());
    assert!(!ctx.is_system_admin());
    assert_eq!(ctx.languages.len(), 2);
  }
}
