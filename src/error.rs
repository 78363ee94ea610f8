//! Error types: persistence failures and the HTTP-facing `AppError`.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Failure reading or writing one of the JSON state files.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("I/O error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid JSON in {path}: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Application-level error type for HTTP handlers.
/// Renders as `{"error": ..., "code": ...}` with a matching status.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("Bad request: {0}")]
  BadRequest(String),

  #[error("Not found: {0}")]
  NotFound(String),

  /// The LLM endpoint failed for a non-chat feature (study plan).
  #[error("Upstream error: {0}")]
  Upstream(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, code, message) = match &self {
      AppError::Store(err) => {
        tracing::error!(target: "study_tutor", error = %err, "Persistence failure");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          "STORAGE_ERROR",
          "An internal error occurred".to_string(),
        )
      }
      AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
      AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
      AppError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR", msg.clone()),
    };

    (status, axum::Json(json!({ "error": message, "code": code }))).into_response()
  }
}
