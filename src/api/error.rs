//! The one error shape every API-facing failure is normalized into.

use std::any::Any;

use serde_json::Value;
use thiserror::Error;

/// A failed API interaction: transport error, non-2xx response, or anything
/// else a query or mutation can fail with.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
  pub message: String,
  /// HTTP status, when the failure came from a response
  pub status: Option<u16>,
  /// Raw response payload (parsed as JSON when possible)
  pub body: Option<Value>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      status: None,
      body: None,
    }
  }

  /// Build an error from a non-success response.
  ///
  /// The message is taken from the body's `message`, `error` or `detail`
  /// field when the body is a JSON object carrying one.
  pub fn from_response(status: u16, body: &str) -> Self {
    let body = if body.trim().is_empty() {
      None
    } else {
      Some(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())))
    };

    let message = body
      .as_ref()
      .and_then(message_from_body)
      .unwrap_or_else(|| format!("Request failed with status {}", status));

    Self {
      message,
      status: Some(status),
      body,
    }
  }

  /// Normalize a panic payload from a spawned task.
  pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "Unknown error".to_string()
    };
    Self::new(message)
  }

  pub fn is_not_found(&self) -> bool {
    self.status == Some(404)
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(self.status, Some(401) | Some(403))
  }
}

fn message_from_body(body: &Value) -> Option<String> {
  match body {
    Value::Object(map) => ["message", "error", "detail"]
      .iter()
      .find_map(|field| map.get(*field).and_then(Value::as_str))
      .map(String::from),
    Value::String(s) if s.len() <= 200 => Some(s.clone()),
    _ => None,
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    Self {
      message: e.to_string(),
      status: e.status().map(|s| s.as_u16()),
      body: None,
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(e: serde_json::Error) -> Self {
    Self::new(format!("Failed to parse response: {}", e))
  }
}

impl From<color_eyre::Report> for ApiError {
  fn from(e: color_eyre::Report) -> Self {
    Self::new(e.to_string())
  }
}

impl From<String> for ApiError {
  fn from(message: String) -> Self {
    Self::new(message)
  }
}

impl From<&str> for ApiError {
  fn from(message: &str) -> Self {
    Self::new(message)
  }
}

impl From<tokio::task::JoinError> for ApiError {
  fn from(e: tokio::task::JoinError) -> Self {
    if e.is_panic() {
      Self::from_panic(e.into_panic())
    } else {
      Self::new("Request was cancelled")
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_response_uses_body_message() {
    let err = ApiError::from_response(422, r#"{"message": "Title is required"}"#);
    assert_eq!(err.message, "Title is required");
    assert_eq!(err.status, Some(422));
    assert_eq!(err.body.unwrap()["message"], "Title is required");
  }

  #[test]
  fn test_from_response_detail_field() {
    let err = ApiError::from_response(400, r#"{"detail": "Bad id"}"#);
    assert_eq!(err.message, "Bad id");
  }

  #[test]
  fn test_from_response_plain_text_body() {
    let err = ApiError::from_response(502, "Bad Gateway");
    assert_eq!(err.message, "Bad Gateway");
    assert_eq!(err.body, Some(Value::String("Bad Gateway".to_string())));
  }

  #[test]
  fn test_from_response_empty_body() {
    let err = ApiError::from_response(500, "");
    assert_eq!(err.message, "Request failed with status 500");
    assert!(err.body.is_none());
  }

  #[test]
  fn test_from_string_has_message() {
    let err: ApiError = "boom".into();
    assert_eq!(err.message, "boom");
    assert_eq!(err.status, None);
    assert_eq!(err.to_string(), "boom");
  }

  #[test]
  fn test_from_panic_payloads() {
    assert_eq!(ApiError::from_panic(Box::new("static")).message, "static");
    assert_eq!(
      ApiError::from_panic(Box::new("owned".to_string())).message,
      "owned"
    );
    assert_eq!(ApiError::from_panic(Box::new(42)).message, "Unknown error");
  }

  #[test]
  fn test_status_helpers() {
    assert!(ApiError::from_response(404, "").is_not_found());
    assert!(ApiError::from_response(401, "").is_unauthorized());
    assert!(!ApiError::new("x").is_unauthorized());
  }
}
