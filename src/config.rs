use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub base_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

/// What `consume_cached_project` evicts on a hit
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsumePolicy {
  /// Wipe every cached project
  #[default]
  EvictAll,
  /// Drop only the consumed entry
  EvictConsumed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_project_ttl_ms")]
  pub project_ttl_ms: u64,
  #[serde(default = "default_dashboard_ttl_ms")]
  pub dashboard_ttl_ms: u64,
  #[serde(default)]
  pub consume: ConsumePolicy,
}

fn default_project_ttl_ms() -> u64 {
  15_000
}

fn default_dashboard_ttl_ms() -> u64 {
  120_000
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      project_ttl_ms: default_project_ttl_ms(),
      dashboard_ttl_ms: default_dashboard_ttl_ms(),
      consume: ConsumePolicy::default(),
    }
  }
}

impl CacheConfig {
  pub fn project_ttl(&self) -> Duration {
    Duration::from_millis(self.project_ttl_ms)
  }

  pub fn dashboard_ttl(&self) -> Duration {
    Duration::from_millis(self.dashboard_ttl_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  #[serde(default = "default_session_ttl_minutes")]
  pub ttl_minutes: i64,
}

fn default_session_ttl_minutes() -> i64 {
  30
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      ttl_minutes: default_session_ttl_minutes(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./conflux.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/conflux/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/conflux/config.yaml\n\
                 with at least `api: {{ base_url: ... }}`."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("conflux.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("conflux").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks CONFLUX_API_TOKEN first, then CONFLUX_TOKEN. Without a token the
  /// client relies on the session cookie alone.
  pub fn get_api_token() -> Option<String> {
    std::env::var("CONFLUX_API_TOKEN")
      .or_else(|_| std::env::var("CONFLUX_TOKEN"))
      .ok()
      .filter(|t| !t.is_empty())
  }

  /// Directory for the session file and logs.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("conflux"))
  }

  /// Host shown in the header when no title is configured.
  pub fn display_title(&self) -> &str {
    if let Some(title) = &self.title {
      return title;
    }
    let url = self.api.base_url.as_str();
    url
      .strip_prefix("https://")
      .or_else(|| url.strip_prefix("http://"))
      .unwrap_or(url)
      .split('/')
      .next()
      .unwrap_or(url)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::from_yaml("api:\n  base_url: https://conflux.example.org/api\n").unwrap();
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.cache.project_ttl(), Duration::from_millis(15_000));
    assert_eq!(config.cache.dashboard_ttl(), Duration::from_millis(120_000));
    assert_eq!(config.cache.consume, ConsumePolicy::EvictAll);
    assert_eq!(config.session.ttl_minutes, 30);
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  base_url: http://localhost:8080
  timeout_secs: 5
title: Conflux (staging)
cache:
  project_ttl_ms: 1000
  consume: evict_consumed
session:
  ttl_minutes: 10
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.api.timeout_secs, 5);
    assert_eq!(config.cache.project_ttl_ms, 1000);
    assert_eq!(config.cache.dashboard_ttl_ms, 120_000);
    assert_eq!(config.cache.consume, ConsumePolicy::EvictConsumed);
    assert_eq!(config.session.ttl_minutes, 10);
    assert_eq!(config.display_title(), "Conflux (staging)");
  }

  #[test]
  fn test_missing_api_section_fails() {
    assert!(Config::from_yaml("title: x\n").is_err());
  }

  #[test]
  fn test_display_title_falls_back_to_host() {
    let config = Config::from_yaml("api:\n  base_url: https://conflux.example.org/api\n").unwrap();
    assert_eq!(config.display_title(), "conflux.example.org");
  }

  #[test]
  fn test_load_explicit_missing_path() {
    assert!(Config::load(Some(Path::new("/nonexistent/conflux.yaml"))).is_err());
  }
}
