//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::QueryRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use shelter_cache::CacheError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// A query parameter was out of range or unrecognised.
  #[error(transparent)]
  Validation(#[from] shelter_core::Error),

  #[error("{0}")]
  BadRequest(String),

  #[error(transparent)]
  Cache(#[from] CacheError),
}

impl ApiError {
  pub fn missing(param: &str) -> Self { Self::BadRequest(format!("{param} is required")) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Cache(e) => {
        // Details stay in the log; callers get a generic message.
        tracing::error!(error = %e, "request failed");
        let message = match e {
          CacheError::Upstream { .. } | CacheError::SourceTask(_) => {
            "upstream shelter source unavailable"
          }
          CacheError::Store(_) => "internal server error",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message.to_owned())
      }
    };
    (status, Json(json!({ "success": false, "message": message }))).into_response()
  }
}
