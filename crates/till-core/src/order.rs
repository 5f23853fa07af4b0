//! Orders and their immutable line snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  cart::CartLine,
  identity::AccountId,
  pricing::CartTotals,
  status::{FulfillmentStatus, OrderStatus, PaymentStatus},
};

// ─── Order number ─────────────────────────────────────────────────────────────

/// Human-readable, globally unique order number, e.g.
/// `ORD-20261018142501-3FA9C2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
  /// A time-derived number with a random suffix. Uniqueness is finally
  /// enforced by the store.
  pub fn generate(now: DateTime<Utc>) -> Self {
    let mut suffix = [0u8; 3];
    OsRng.fill_bytes(&mut suffix);
    Self(format!(
      "ORD-{}-{}",
      now.format("%Y%m%d%H%M%S"),
      hex::encode_upper(suffix)
    ))
  }

  /// Wrap a number read back from storage.
  pub fn from_stored(value: String) -> Self { Self(value) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Records ──────────────────────────────────────────────────────────────────

/// The durable record of a checkout attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id:                 Uuid,
  pub order_number:       OrderNumber,
  pub cart_id:            Option<Uuid>,
  pub account_id:         AccountId,
  pub status:             OrderStatus,
  pub payment_status:     PaymentStatus,
  pub fulfillment_status: FulfillmentStatus,
  pub subtotal:           i64,
  pub discount_total:     i64,
  pub tax_total:          i64,
  pub shipping_total:     i64,
  pub total:              i64,
  pub currency:           String,
  pub payment_session_id: Option<String>,
  pub payment_intent_id:  Option<String>,
  pub placed_at:          Option<DateTime<Utc>>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

/// A cart line as it stood when checkout was initiated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub id:         Uuid,
  pub order_id:   Uuid,
  pub product_id: Uuid,
  pub variant_id: Uuid,
  pub name:       String,
  pub sku:        String,
  pub size:       Option<String>,
  pub color:      Option<String>,
  pub quantity:   i64,
  pub unit_price: i64,
  pub line_total: i64,
  /// Descriptive fields that are not queried but shown on receipts.
  pub snapshot:   serde_json::Value,
}

// ─── Upsert input / output ────────────────────────────────────────────────────

/// One line to snapshot into a pending order. The line total is recomputed
/// by the store.
#[derive(Debug, Clone)]
pub struct PendingOrderItem {
  pub product_id: Uuid,
  pub variant_id: Uuid,
  pub name:       String,
  pub sku:        String,
  pub size:       Option<String>,
  pub color:      Option<String>,
  pub quantity:   i64,
  pub unit_price: i64,
  pub snapshot:   serde_json::Value,
}

impl From<&CartLine> for PendingOrderItem {
  fn from(line: &CartLine) -> Self {
    PendingOrderItem {
      product_id: line.product_id,
      variant_id: line.variant_id,
      name:       line.product_name.clone(),
      sku:        line.sku.clone(),
      size:       line.size.clone(),
      color:      line.color.clone(),
      quantity:   line.quantity,
      unit_price: line.unit_price,
      snapshot:   serde_json::json!({
        "productSlug":  line.product_slug,
        "categoryName": line.category_name,
        "imageUrl":     line.image_url,
      }),
    }
  }
}

/// Everything the order upsert needs from the current cart snapshot.
#[derive(Debug, Clone)]
pub struct PendingOrderInput {
  pub cart_id:        Uuid,
  pub account_id:     AccountId,
  pub currency:       String,
  pub discount_total: i64,
  pub tax_total:      i64,
  pub totals:         CartTotals,
  pub items:          Vec<PendingOrderItem>,
}

/// Result of the order upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedOrder {
  pub order_id:     Uuid,
  pub order_number: OrderNumber,
  /// `true` when an existing order row was replaced in place.
  pub reused:       bool,
}
