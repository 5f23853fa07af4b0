//! Error types for `till-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown {kind} value: {value:?}")]
  UnknownStatus { kind: &'static str, value: String },

  #[error("invalid session handle")]
  InvalidSessionHandle,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
