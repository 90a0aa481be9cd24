//! HTTP-facing error type. Every failure leaves the server as `{"message": ...}`
//! with a 400 or 404 status. Stores are in-memory, so there is no 500 path.

use axum::{
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::chat::ChatError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),
  #[error("{0}")]
  NotFound(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
  pub message: String,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    debug!(target: "trailhead", %status, message = %self, "Request rejected");
    (status, Json(ErrorBody { message: self.to_string() })).into_response()
  }
}

impl From<ChatError> for ApiError {
  fn from(e: ChatError) -> Self {
    match e {
      ChatError::InvalidInput => ApiError::BadRequest(e.to_string()),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self {
    ApiError::BadRequest(e.body_text())
  }
}

impl From<PathRejection> for ApiError {
  fn from(e: PathRejection) -> Self {
    ApiError::BadRequest(e.body_text())
  }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self {
    ApiError::BadRequest(e.body_text())
  }
}
