//! Extractors whose rejections render as [`ApiError`] JSON bodies.
//!
//! Drop-in replacements for axum's `Json`, `Path` and `Query`. A body that
//! does not parse, or a path segment naming an unknown entity type, comes
//! back as `400 {"error": ...}` like every other client error.

use axum::{
  extract::{FromRequest, FromRequestParts},
  response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
  fn into_response(self) -> Response { axum::Json(self.0).into_response() }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);
