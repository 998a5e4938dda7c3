//! Typed access to the Conflux REST API.

pub mod client;
pub mod error;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use client::{ApiClient, HttpApiClient};
pub use error::{ApiError, ApiResult};
