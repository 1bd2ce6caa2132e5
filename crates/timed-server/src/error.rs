//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use timed_core::store::StoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Domain(#[from] timed_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Keep domain failures typed; everything else is a storage fault.
  pub fn store<E: StoreError>(e: E) -> Self {
    match e.into_core() {
      Ok(core) => Self::Domain(core),
      Err(other) => Self::Store(Box::new(other)),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(r: PathRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(r: QueryRejection) -> Self { Self::BadRequest(r.body_text()) }
}

/// The status each domain failure is reported with.
fn domain_status(e: &timed_core::Error) -> StatusCode {
  use timed_core::Error as E;
  match e {
    E::NoAssignment { .. } | E::AssignmentNotFound(_) | E::RecordNotFound(_) => {
      StatusCode::NOT_FOUND
    }
    E::PermissionDenied { .. } => StatusCode::FORBIDDEN,
    E::Overlap { .. } | E::AlreadyClosed(_) | E::AlreadyArchived(_) => StatusCode::CONFLICT,
    E::InvalidInterval { .. }
    | E::DateOutOfRange(_)
    | E::InvalidParent { .. }
    | E::InvalidPercentage(_)
    | E::InvalidWorktime
    | E::OwnerRequired(_)
    | E::OwnerNotAllowed(_)
    | E::EntityTypeMismatch { .. } => StatusCode::BAD_REQUEST,
    E::AmbiguousAssignment { .. } | E::UnknownEntityType(_) | E::Serialization(_) => {
      StatusCode::INTERNAL_SERVER_ERROR
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "error": "authentication required" })),
        )
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"timed\""),
        );
        return res;
      }
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Domain(e) => (domain_status(e), e.to_string()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": message }))).into_response()
  }
}
