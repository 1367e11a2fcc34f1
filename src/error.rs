//! Application error type and its mapping to JSON HTTP responses.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;

/// Errors surfaced by HTTP handlers. Every variant renders as
/// `{"error": "..."}` with the matching status code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  NotFound(String),

  #[error("Method not allowed")]
  MethodNotAllowed,

  /// Shown to the client verbatim.
  #[error("{0}")]
  Upstream(String),

  /// The model answered but not in a shape we could use; `raw` is echoed
  /// back so the output can be inspected.
  #[error("{message}")]
  UpstreamParse { message: String, raw: String },
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, body) = match self {
      AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
      AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
      AppError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, json!({ "error": "Method not allowed" })),
      AppError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
      AppError::UpstreamParse { message, raw } => {
        tracing::error!(target: "medlearn_backend", raw_len = raw.len(), "Unparseable model output");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message, "raw": raw }))
      }
    };
    (status, Json(body)).into_response()
  }
}
