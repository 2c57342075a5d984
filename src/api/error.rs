//! Canonical error produced at the API client boundary.
//!
//! Every failure the client can observe (transport, HTTP status, malformed
//! payload) is normalized into one `ApiError` so stores can treat them alike.

use thiserror::Error;

/// Message used when the server gives us nothing better.
pub const FALLBACK_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// No server reachable, connection reset, or the request timed out
  Network,
  /// Server answered with a validation or business error
  Server,
  /// The requested entity does not exist
  NotFound,
  /// Response body did not match the expected shape
  Decode,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
  pub kind: ErrorKind,
  pub message: String,
}

impl ApiError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }

  pub fn network(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Network, message)
  }

  pub fn decode(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Decode, message)
  }

  /// Build an error from a non-success HTTP status and its raw body.
  ///
  /// The body's `message` field wins when present and non-empty.
  pub fn from_status(status: u16, body: &str) -> Self {
    let message = serde_json::from_str::<serde_json::Value>(body)
      .ok()
      .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
      .filter(|m| !m.trim().is_empty())
      .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());

    let kind = if status == 404 {
      ErrorKind::NotFound
    } else {
      ErrorKind::Server
    };

    Self { kind, message }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      return Self::decode(format!("Invalid response: {}", e));
    }
    if let Some(status) = e.status() {
      return Self::from_status(status.as_u16(), "");
    }
    if e.is_timeout() {
      return Self::network("Request timed out");
    }
    Self::network("Network error")
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(e: serde_json::Error) -> Self {
    Self::decode(format!("Invalid response: {}", e))
  }
}
