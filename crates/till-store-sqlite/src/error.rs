//! Error type for `till-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] till_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("cart not found: {0}")]
  CartNotFound(Uuid),

  #[error("cart {0} is no longer active")]
  CartNotActive(Uuid),

  #[error("product variant not found: {0}")]
  VariantNotFound(Uuid),

  /// A pending order needs at least one line.
  #[error("cannot persist an order with no items")]
  EmptyOrder,

  /// Inserting a new pending order collided with a uniqueness constraint
  /// (another pending order for the cart, or an order-number clash).
  #[error("conflicting pending order for cart {0}")]
  PendingOrderConflict(Uuid),

  /// Writing the order's line snapshot failed; the whole upsert was rolled
  /// back.
  #[error("failed to snapshot order items: {0}")]
  SnapshotFailed(#[source] rusqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl till_core::store::StoreError for Error {
  fn is_not_found(&self) -> bool {
    matches!(
      self,
      Error::CartNotFound(_) | Error::CartNotActive(_) | Error::VariantNotFound(_)
    )
  }
}
