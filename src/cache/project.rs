//! Project detail and dashboard caches.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::traits::CacheResult;
use crate::api::types::{Project, TimelineItem};
use crate::api::{ApiClient, ApiResult};
use crate::config::{CacheConfig, ConsumePolicy};

/// A cached project, possibly still being fetched.
#[derive(Debug, Clone)]
pub struct CachedProject {
  pub data: Project,
  pub timeline: Option<Vec<TimelineItem>>,
  /// Wall-clock time the entry was written, for display
  pub cached_at: DateTime<Utc>,
  /// True for the placeholder written while a preload is in flight
  pub is_loading: bool,
  stored_at: Instant,
}

impl CachedProject {
  fn loaded(data: Project, timeline: Option<Vec<TimelineItem>>) -> Self {
    Self {
      data,
      timeline,
      cached_at: Utc::now(),
      is_loading: false,
      stored_at: Instant::now(),
    }
  }

  fn loading(id: &str) -> Self {
    Self {
      is_loading: true,
      ..Self::loaded(Project::placeholder(id), None)
    }
  }

  fn is_expired(&self, ttl: Duration) -> bool {
    self.stored_at.elapsed() > ttl
  }
}

/// The single dashboard slot.
#[derive(Debug, Clone)]
pub struct CachedDashboardData {
  pub projects: Vec<Project>,
  pub cached_at: DateTime<Utc>,
  stored_at: Instant,
}

impl CachedDashboardData {
  fn new(projects: Vec<Project>) -> Self {
    Self {
      projects,
      cached_at: Utc::now(),
      stored_at: Instant::now(),
    }
  }

  fn is_expired(&self, ttl: Duration) -> bool {
    self.stored_at.elapsed() > ttl
  }
}

#[derive(Debug, Default)]
struct CacheState {
  projects: HashMap<String, CachedProject>,
  dashboard: Option<CachedDashboardData>,
  /// Ids with a background fetch in flight
  preloading: HashSet<String>,
  /// Bumped on every dashboard invalidation
  dashboard_version: u64,
}

/// Shared, time-boxed cache of project data.
///
/// Constructed once at the app root and cloned into views; clones share the
/// same state. Expired entries are evicted lazily when read.
#[derive(Clone)]
pub struct ProjectCache {
  api: Arc<dyn ApiClient>,
  state: Arc<Mutex<CacheState>>,
  project_ttl: Duration,
  dashboard_ttl: Duration,
  consume_policy: ConsumePolicy,
}

impl ProjectCache {
  pub fn new(api: Arc<dyn ApiClient>, config: &CacheConfig) -> Self {
    Self {
      api,
      state: Arc::new(Mutex::new(CacheState::default())),
      project_ttl: config.project_ttl(),
      dashboard_ttl: config.dashboard_ttl(),
      consume_policy: config.consume,
    }
  }

  fn lock(&self) -> MutexGuard<'_, CacheState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn lookup(state: &mut CacheState, id: &str, ttl: Duration) -> Option<CachedProject> {
    if state.projects.get(id)?.is_expired(ttl) {
      state.projects.remove(id);
      debug!(project_id = id, "evicted expired project");
      return None;
    }
    state.projects.get(id).cloned()
  }

  /// Get a cached project if present and unexpired.
  pub fn get_cached_project(&self, id: &str) -> Option<CachedProject> {
    let mut state = self.lock();
    Self::lookup(&mut state, id, self.project_ttl)
  }

  /// Look up a project on navigation into its detail view.
  ///
  /// A hit evicts according to the consume policy: the whole project map
  /// under `EvictAll`, just this id under `EvictConsumed`.
  pub fn consume_cached_project(&self, id: &str) -> Option<CachedProject> {
    let mut state = self.lock();
    let entry = Self::lookup(&mut state, id, self.project_ttl)?;

    match self.consume_policy {
      ConsumePolicy::EvictAll => state.projects.clear(),
      ConsumePolicy::EvictConsumed => {
        state.projects.remove(id);
      }
    }
    debug!(project_id = id, policy = ?self.consume_policy, "consumed cached project");

    Some(entry)
  }

  pub fn is_preloading(&self, id: &str) -> bool {
    self.lock().preloading.contains(id)
  }

  /// Fetch a project and its timeline into the cache ahead of navigation.
  ///
  /// Does nothing if a fresh entry exists or a preload for the id is already
  /// running. Timeline failures are tolerated; a failed project fetch leaves
  /// no entry behind.
  pub async fn preload_project(&self, id: &str) {
    {
      let mut state = self.lock();
      if state.preloading.contains(id) {
        debug!(project_id = id, "preload already in flight");
        return;
      }
      if let Some(entry) = state.projects.get(id) {
        if !entry.is_loading && !entry.is_expired(self.project_ttl) {
          return;
        }
      }
      state.preloading.insert(id.to_string());
      state
        .projects
        .insert(id.to_string(), CachedProject::loading(id));
    }

    let _guard = PreloadGuard {
      state: Arc::clone(&self.state),
      id: id.to_string(),
    };

    let fetched = fetch_project_detail(self.api.as_ref(), id).await;

    let mut state = self.lock();
    // The placeholder is gone if the entry was overwritten or the cache
    // cleared while fetching; the newer state wins.
    let placeholder_kept = state.projects.get(id).is_some_and(|e| e.is_loading);
    match fetched {
      Ok((data, timeline)) if placeholder_kept => {
        state
          .projects
          .insert(id.to_string(), CachedProject::loaded(data, Some(timeline)));
        debug!(project_id = id, "preloaded project");
      }
      Ok(_) => {
        debug!(project_id = id, "dropping preload superseded while in flight");
      }
      Err(e) => {
        if placeholder_kept {
          state.projects.remove(id);
        }
        warn!(project_id = id, error = %e, "failed to preload project");
      }
    }
  }

  /// Run `preload_project` on a background task.
  pub fn spawn_preload(&self, id: impl Into<String>) -> JoinHandle<()> {
    let cache = self.clone();
    let id = id.into();
    tokio::spawn(async move { cache.preload_project(&id).await })
  }

  /// Overwrite an entry with data the caller already has (e.g. a mutation
  /// response).
  pub fn update_cache(&self, id: &str, data: Project, timeline: Option<Vec<TimelineItem>>) {
    self
      .lock()
      .projects
      .insert(id.to_string(), CachedProject::loaded(data, timeline));
  }

  pub fn remove_from_cache(&self, id: &str) {
    self.lock().projects.remove(id);
  }

  pub fn clear_cache(&self) {
    self.lock().projects.clear();
  }

  pub fn get_cached_dashboard_data(&self) -> Option<Vec<Project>> {
    let state = self.lock();
    state
      .dashboard
      .as_ref()
      .filter(|slot| !slot.is_expired(self.dashboard_ttl))
      .map(|slot| slot.projects.clone())
  }

  pub fn set_cached_dashboard_data(&self, projects: Vec<Project>) {
    self.lock().dashboard = Some(CachedDashboardData::new(projects));
  }

  pub fn invalidate_dashboard_data(&self) {
    let mut state = self.lock();
    state.dashboard = None;
    state.dashboard_version += 1;
    debug!(version = state.dashboard_version, "invalidated dashboard data");
  }

  /// Changes whenever the dashboard slot is invalidated, so a list view can
  /// tell that something it shows was written elsewhere.
  pub fn dashboard_version(&self) -> u64 {
    self.lock().dashboard_version
  }

  /// Re-fetch the dashboard list and store it.
  ///
  /// On failure the previous slot is left as it was.
  pub async fn refresh_dashboard_data(&self) -> ApiResult<Vec<Project>> {
    match self.api.list_projects().await {
      Ok(projects) => {
        self.set_cached_dashboard_data(projects.clone());
        Ok(projects)
      }
      Err(e) => {
        warn!(error = %e, "failed to refresh dashboard data");
        Err(e)
      }
    }
  }

  /// Cache-first dashboard load.
  ///
  /// 1. Fresh slot - return it
  /// 2. Otherwise refresh from the API
  /// 3. If the refresh fails and an expired slot exists, serve it as stale
  pub async fn load_dashboard(&self) -> ApiResult<CacheResult<Vec<Project>>> {
    let stale = {
      let state = self.lock();
      match &state.dashboard {
        Some(slot) if !slot.is_expired(self.dashboard_ttl) => {
          return Ok(CacheResult::from_cache(
            slot.projects.clone(),
            slot.cached_at,
          ));
        }
        Some(slot) => Some((slot.projects.clone(), slot.cached_at)),
        None => None,
      }
    };

    match self.refresh_dashboard_data().await {
      Ok(projects) => Ok(CacheResult::from_network(projects)),
      Err(e) => match stale {
        Some((projects, cached_at)) => Ok(CacheResult::stale(projects, cached_at)),
        None => Err(e),
      },
    }
  }

  #[cfg(test)]
  fn len(&self) -> usize {
    self.lock().projects.len()
  }
}

/// Fetch a project together with its timeline.
///
/// The two requests run concurrently. A failed timeline fetch is logged and
/// treated as empty; only the project fetch decides success.
pub async fn fetch_project_detail(
  api: &dyn ApiClient,
  id: &str,
) -> ApiResult<(Project, Vec<TimelineItem>)> {
  let (project, timeline) = tokio::join!(api.get_project(id), api.get_project_timeline(id));

  let timeline = timeline.unwrap_or_else(|e| {
    warn!(project_id = id, error = %e, "failed to load timeline");
    Vec::new()
  });

  Ok((project?, timeline))
}

/// Clears the preloading flag however the preload ends, including when its
/// future is dropped mid-fetch.
struct PreloadGuard {
  state: Arc<Mutex<CacheState>>,
  id: String,
}

impl Drop for PreloadGuard {
  fn drop(&mut self) {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    state.preloading.remove(&self.id);
    if state
      .projects
      .get(&self.id)
      .is_some_and(|entry| entry.is_loading)
    {
      state.projects.remove(&self.id);
    }
  }
}
