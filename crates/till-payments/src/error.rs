//! Error types for `till-payments`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The provider answered with a non-success status.
  #[error("payment provider returned {status}: {message}")]
  Provider { status: u16, message: String },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("webhook secret cannot be used as an hmac key")]
  InvalidSecret,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a webhook signature was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
  #[error("signature header is malformed")]
  Malformed,

  #[error("signature timestamp is outside the tolerance window ({age}s)")]
  Stale { age: i64 },

  #[error("no signature matches the payload")]
  Mismatch,
}
