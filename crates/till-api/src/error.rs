//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use till_core::store::StoreError;

use crate::checkout::CheckoutError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("sign-in required")]
  Unauthorized,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Checkout(#[from] CheckoutError),
}

impl ApiError {
  /// Map a store failure, keeping missing references distinct from faults.
  pub fn store<E: StoreError>(err: E) -> Self {
    if err.is_not_found() {
      ApiError::NotFound(err.to_string())
    } else {
      ApiError::Store(Box::new(err))
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
      ApiError::Checkout(CheckoutError::Store(_)) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        "checkout failed".to_owned(),
      ),
      ApiError::Checkout(_) => {
        (StatusCode::BAD_GATEWAY, "payment provider unavailable".to_owned())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
