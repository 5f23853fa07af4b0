//! Closed status vocabularies for carts and orders.
//!
//! Every status is stored as lowercase snake_case text; the same spelling is
//! used on the wire.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

/// Parse a stored status string, naming the vocabulary on failure.
pub fn parse_status<T: FromStr>(kind: &'static str, value: &str) -> Result<T> {
  value.parse().map_err(|_| Error::UnknownStatus {
    kind,
    value: value.to_owned(),
  })
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CartStatus {
  #[default]
  Active,
  Converted,
  Abandoned,
}

/// Lifecycle of an order: `pending → paid → (fulfilled | cancelled |
/// refunded)`, with `cancelled` also reachable directly from `pending`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
  #[default]
  Pending,
  Paid,
  Fulfilled,
  Cancelled,
  Refunded,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
  #[default]
  Pending,
  RequiresAction,
  Succeeded,
  Refunded,
  Failed,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FulfillmentStatus {
  #[default]
  Pending,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}
