use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{
  Language, NewProject, NewSystemAdmin, Project, ProjectRequest, SystemAdmin, TimelineItem,
  UserSession,
};
use crate::config::Config;

/// The operations the rest of the app needs from the Conflux backend.
///
/// The HTTP implementation lives below; tests substitute in-memory fakes.
#[async_trait]
pub trait ApiClient: Send + Sync {
  async fn user_session(&self) -> ApiResult<UserSession>;

  async fn list_projects(&self) -> ApiResult<Vec<Project>>;

  async fn get_project(&self, id: &str) -> ApiResult<Project>;

  async fn get_project_timeline(&self, id: &str) -> ApiResult<Vec<TimelineItem>>;

  async fn create_project(&self, project: NewProject) -> ApiResult<Project>;

  async fn update_project(&self, id: &str, project: ProjectRequest) -> ApiResult<Project>;

  async fn delete_project(&self, id: &str) -> ApiResult<()>;

  async fn list_system_admins(&self) -> ApiResult<Vec<SystemAdmin>>;

  async fn add_system_admin(&self, admin: NewSystemAdmin) -> ApiResult<SystemAdmin>;

  async fn remove_system_admin(&self, id: &str) -> ApiResult<()>;

  async fn list_languages(&self) -> ApiResult<Vec<Language>>;
}

/// Conflux REST client over reqwest
#[derive(Clone)]
pub struct HttpApiClient {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl HttpApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    Self::with_base_url(
      &config.api.base_url,
      Config::get_api_token(),
      Duration::from_secs(config.api.timeout_secs),
    )
  }

  pub fn with_base_url(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
    let base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API base URL {}: {}", base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("API base URL {} cannot be used as a base", base_url));
    }

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .cookie_store(true)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token,
    })
  }

  /// Build an endpoint URL from path segments; each segment is percent-encoded.
  fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::new(format!("Invalid API base URL {}", self.base_url)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn request(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
    let url = self.endpoint(segments)?;
    debug!(%method, %url, "api request");

    let builder = self.http.request(method, url);
    Ok(match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    })
  }

  async fn send(builder: RequestBuilder) -> ApiResult<reqwest::Response> {
    let response = builder.send().await?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_response(status.as_u16(), &body))
  }

  async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
    let response = Self::send(self.request(Method::GET, segments)?).await?;
    Ok(response.json().await?)
  }
}

#[async_trait]
impl ApiClient for HttpApiClient {
  async fn user_session(&self) -> ApiResult<UserSession> {
    self.get_json(&["session"]).await
  }

  async fn list_projects(&self) -> ApiResult<Vec<Project>> {
    self.get_json(&["projects"]).await
  }

  async fn get_project(&self, id: &str) -> ApiResult<Project> {
    self.get_json(&["projects", id]).await
  }

  async fn get_project_timeline(&self, id: &str) -> ApiResult<Vec<TimelineItem>> {
    self.get_json(&["projects", id, "timeline"]).await
  }

  async fn create_project(&self, project: NewProject) -> ApiResult<Project> {
    let builder = self.request(Method::POST, &["projects"])?.json(&project);
    Ok(Self::send(builder).await?.json().await?)
  }

  async fn update_project(&self, id: &str, project: ProjectRequest) -> ApiResult<Project> {
    let builder = self.request(Method::PUT, &["projects", id])?.json(&project);
    Ok(Self::send(builder).await?.json().await?)
  }

  async fn delete_project(&self, id: &str) -> ApiResult<()> {
    Self::send(self.request(Method::DELETE, &["projects", id])?).await?;
    Ok(())
  }

  async fn list_system_admins(&self) -> ApiResult<Vec<SystemAdmin>> {
    self.get_json(&["admins"]).await
  }

  async fn add_system_admin(&self, admin: NewSystemAdmin) -> ApiResult<SystemAdmin> {
    let builder = self.request(Method::POST, &["admins"])?.json(&admin);
    Ok(Self::send(builder).await?.json().await?)
  }

  async fn remove_system_admin(&self, id: &str) -> ApiResult<()> {
    Self::send(self.request(Method::DELETE, &["admins", id])?).await?;
    Ok(())
  }

  async fn list_languages(&self) -> ApiResult<Vec<Language>> {
    self.get_json(&["languages"]).await
  }
}
