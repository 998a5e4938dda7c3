//! Signed-in user session, persisted between runs for a short while.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::types::UserSession;
use crate::api::{ApiClient, ApiResult};

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
  user_data: UserSession,
  timestamp: DateTime<Utc>,
}

/// File-backed session blob that expires after a fixed time.
#[derive(Debug, Clone)]
pub struct SessionStore {
  path: PathBuf,
  ttl: Duration,
}

impl SessionStore {
  pub fn new(dir: &Path, ttl_minutes: i64) -> Self {
    Self {
      path: dir.join(SESSION_FILE),
      ttl: Duration::minutes(ttl_minutes),
    }
  }

  /// The stored session, if one exists and has not expired.
  pub fn load(&self) -> Option<UserSession> {
    let contents = std::fs::read_to_string(&self.path).ok()?;
    let stored: StoredSession = match serde_json::from_str(&contents) {
      Ok(stored) => stored,
      Err(e) => {
        debug!(error = %e, "discarding unreadable session file");
        self.clear();
        return None;
      }
    };

    if Utc::now() - stored.timestamp > self.ttl {
      debug!("stored session expired");
      self.clear();
      return None;
    }

    Some(stored.user_data)
  }

  pub fn save(&self, session: &UserSession) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let stored = StoredSession {
      user_data: session.clone(),
      timestamp: Utc::now(),
    };
    let data = serde_json::to_vec(&stored)?;
    std::fs::write(&self.path, data)
      .map_err(|e| eyre!("Failed to write session file {}: {}", self.path.display(), e))?;
    Ok(())
  }

  pub fn clear(&self) {
    if let Err(e) = std::fs::remove_file(&self.path) {
      if e.kind() != std::io::ErrorKind::NotFound {
        warn!(error = %e, "failed to remove session file");
      }
    }
  }

  /// Return the current session, asking the API when nothing fresh is stored.
  ///
  /// A failed session fetch clears whatever was stored.
  pub async fn establish(&self, api: &dyn ApiClient) -> ApiResult<UserSession> {
    if let Some(session) = self.load() {
      debug!(user = %session.email, "using stored session");
      return Ok(session);
    }

    match api.user_session().await {
      Ok(session) => {
        info!(user = %session.email, admin = session.system_admin, "session established");
        if let Err(e) = self.save(&session) {
          warn!(error = %e, "failed to persist session");
        }
        Ok(session)
      }
      Err(e) => {
        warn!(error = %e, "failed to establish session");
        self.clear();
        Err(e)
      }
    }
  }

  #[cfg(test)]
  fn write_with_timestamp(&self, session: &UserSession, timestamp: DateTime<Utc>) {
    let stored = StoredSession {
      user_data: session.clone(),
      timestamp,
    };
    std::fs::write(&self.path, serde_json::to_vec(&stored).unwrap()).unwrap();
  }
}
