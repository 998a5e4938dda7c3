//! In-memory freshness layer for project data.
//!
//! This module keeps recently fetched projects and the dashboard list around
//! for a short time so navigation feels instant:
//! - Project entries keyed by id, expiring after `project_ttl`
//! - A single dashboard slot, expiring after `dashboard_ttl`
//! - Background preloading with de-duplication of in-flight fetches

mod project;
mod traits;

pub use project::{fetch_project_detail, ProjectCache};
pub use traits::{CacheResult, CacheSource};
