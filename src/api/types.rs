//! Domain records for the Conflux API.
//!
//! There is one canonical record per entity. Responses deserialize straight
//! into these; writes go through the request projections at the bottom of
//! the file, which drop server-owned fields.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Projects
// ============================================================================

/// A research project with everything the detail screens render
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
  pub id: String,
  #[serde(default)]
  pub titles: Vec<Title>,
  #[serde(default)]
  pub descriptions: Vec<Description>,
  #[serde(default)]
  pub contributors: Vec<Contributor>,
  #[serde(default)]
  pub products: Vec<Product>,
  #[serde(default)]
  pub organisations: Vec<Organisation>,
  pub start_date: Option<NaiveDate>,
  pub end_date: Option<NaiveDate>,
  pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
  /// A record carrying only the id, used while the real one is loading.
  pub fn placeholder(id: &str) -> Self {
    Self {
      id: id.to_string(),
      ..Self::default()
    }
  }

  /// The title shown in lists and headers.
  ///
  /// Falls back to the first title of any kind, then to the id.
  pub fn display_title(&self) -> &str {
    self
      .titles
      .iter()
      .find(|t| t.kind == TitleKind::Primary)
      .or_else(|| self.titles.first())
      .map(|t| t.text.as_str())
      .unwrap_or(&self.id)
  }

  pub fn lead(&self) -> Option<&Contributor> {
    self.contributors.iter().find(|c| c.leader)
  }

  /// Replace the primary title text, adding a primary title if there is none.
  pub fn with_primary_title(mut self, text: &str) -> Self {
    match self
      .titles
      .iter_mut()
      .find(|t| t.kind == TitleKind::Primary)
    {
      Some(title) => title.text = text.to_string(),
      None => self.titles.insert(
        0,
        Title {
          id: None,
          text: text.to_string(),
          kind: TitleKind::Primary,
          language: None,
          start_date: None,
          end_date: None,
        },
      ),
    }
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleKind {
  Primary,
  Alternative,
  Acronym,
  Short,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Title {
  pub id: Option<String>,
  pub text: String,
  #[serde(rename = "type")]
  pub kind: TitleKind,
  pub language: Option<String>,
  pub start_date: Option<NaiveDate>,
  pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
  Primary,
  Alternative,
  Brief,
  Objectives,
  Methods,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
  pub id: Option<String>,
  pub text: String,
  #[serde(rename = "type")]
  pub kind: DescriptionKind,
  pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
  pub id: String,
  pub name: String,
  pub orcid: Option<String>,
  pub email: Option<String>,
  #[serde(default)]
  pub roles: Vec<String>,
  #[serde(default)]
  pub leader: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: String,
  pub title: String,
  pub url: Option<String>,
  #[serde(rename = "type", default)]
  pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organisation {
  pub id: String,
  pub name: String,
  pub ror: Option<String>,
  #[serde(default)]
  pub role: String,
}

/// A single entry in a project's change history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
  pub timestamp: DateTime<Utc>,
  pub actor: Option<String>,
  pub message: String,
}

// ============================================================================
// Administration and session
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemAdmin {
  pub id: String,
  pub email: String,
  pub name: Option<String>,
}

/// The signed-in user as reported by the session endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
  pub user_id: String,
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub system_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
  pub code: String,
  pub name: String,
}

// ============================================================================
// Request projections
// ============================================================================

/// Write model for `PUT /projects/{id}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
  pub titles: Vec<TitleRequest>,
  pub descriptions: Vec<DescriptionRequest>,
  pub contributor_ids: Vec<String>,
  pub product_ids: Vec<String>,
  pub organisation_ids: Vec<String>,
  pub start_date: Option<NaiveDate>,
  pub end_date: Option<NaiveDate>,
}

impl From<&Project> for ProjectRequest {
  fn from(project: &Project) -> Self {
    Self {
      titles: project.titles.iter().map(TitleRequest::from).collect(),
      descriptions: project
        .descriptions
        .iter()
        .map(DescriptionRequest::from)
        .collect(),
      contributor_ids: project.contributors.iter().map(|c| c.id.clone()).collect(),
      product_ids: project.products.iter().map(|p| p.id.clone()).collect(),
      organisation_ids: project.organisations.iter().map(|o| o.id.clone()).collect(),
      start_date: project.start_date,
      end_date: project.end_date,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleRequest {
  pub text: String,
  #[serde(rename = "type")]
  pub kind: TitleKind,
  pub language: Option<String>,
  pub start_date: Option<NaiveDate>,
  pub end_date: Option<NaiveDate>,
}

impl From<&Title> for TitleRequest {
  fn from(title: &Title) -> Self {
    Self {
      text: title.text.clone(),
      kind: title.kind,
      language: title.language.clone(),
      start_date: title.start_date,
      end_date: title.end_date,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionRequest {
  pub text: String,
  #[serde(rename = "type")]
  pub kind: DescriptionKind,
  pub language: Option<String>,
}

impl From<&Description> for DescriptionRequest {
  fn from(description: &Description) -> Self {
    Self {
      text: description.text.clone(),
      kind: description.kind,
      language: description.language.clone(),
    }
  }
}

/// Write model for `POST /projects`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
  pub primary_title: String,
  pub language: Option<String>,
}

/// Write model for `POST /admins`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSystemAdmin {
  pub email: String,
}
