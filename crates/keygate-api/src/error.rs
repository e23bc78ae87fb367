//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! [`ApiError`] covers the admin surface. The public validation endpoints
//! report business outcomes in the response body and only fail with
//! [`internal_failure`].

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an admin handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(#[source] keygate_core::Error),
}

impl From<keygate_core::Error> for ApiError {
  fn from(e: keygate_core::Error) -> Self {
    use keygate_core::Error as E;
    match e {
      E::Validation(_) | E::ExpiryOverflow => ApiError::BadRequest(e.to_string()),
      e if e.is_not_found() => ApiError::NotFound(e.to_string()),
      e if e.is_conflict() => ApiError::Conflict(e.to_string()),
      e => ApiError::Internal(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "admin request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

/// The response for a public request whose store transaction failed.
pub fn internal_failure(e: keygate_core::Error) -> Response {
  tracing::error!(error = %e, "validation request failed");
  (
    StatusCode::INTERNAL_SERVER_ERROR,
    Json(json!({ "status": "error", "reason": "internal" })),
  )
    .into_response()
}
