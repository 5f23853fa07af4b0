//! Carts, cart lines and the cart summary read model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  identity::{AccountId, SessionHandle},
  pricing::CartTotals,
  status::CartStatus,
};

/// One shopper's cart. Monetary fields are written only by totals
/// recalculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
  pub id:             Uuid,
  #[serde(skip_serializing)]
  pub session_handle: Option<SessionHandle>,
  pub account_id:     Option<AccountId>,
  pub currency:       String,
  pub subtotal:       i64,
  pub discount_total: i64,
  pub tax_total:      i64,
  pub shipping_total: i64,
  pub total:          i64,
  pub status:         CartStatus,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl Cart {
  pub fn totals(&self) -> CartTotals {
    CartTotals {
      subtotal: self.subtotal,
      discount: self.discount_total,
      tax:      self.tax_total,
      shipping: self.shipping_total,
      total:    self.total,
    }
  }
}

/// A cart line joined with its product, variant and category display data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
  pub id:            Uuid,
  pub variant_id:    Uuid,
  pub product_id:    Uuid,
  pub product_name:  String,
  pub product_slug:  String,
  pub image_url:     Option<String>,
  pub sku:           String,
  pub size:          Option<String>,
  pub color:         Option<String>,
  pub category_name: Option<String>,
  pub category_slug: Option<String>,
  pub quantity:      i64,
  pub unit_price:    i64,
  pub line_total:    i64,
}

/// What the cart view renders. `cart` is `None` when the caller has no cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
  pub cart:   Option<Cart>,
  pub items:  Vec<CartLine>,
  pub totals: CartTotals,
}

impl CartSummary {
  /// The shape returned when no cart can be resolved. Not an error.
  pub fn empty() -> Self { Self::default() }

  pub fn is_empty(&self) -> bool { self.items.is_empty() }
}
