//! Server-side pricing rules: quantity clamping, line totals and cart totals.
//!
//! Totals are always derived from stored line rows. Nothing supplied by a
//! client is ever trusted as a price or a total.

use serde::{Deserialize, Serialize};

/// Smallest quantity a cart or order line may carry.
pub const MIN_LINE_QUANTITY: i64 = 1;
/// Largest quantity a cart or order line may carry.
pub const MAX_LINE_QUANTITY: i64 = 10;

/// Clamp a requested quantity into `[MIN_LINE_QUANTITY, MAX_LINE_QUANTITY]`.
pub fn clamp_quantity(quantity: i64) -> i64 {
  quantity.clamp(MIN_LINE_QUANTITY, MAX_LINE_QUANTITY)
}

/// `quantity × unit_price`, in minor currency units.
pub fn line_total(quantity: i64, unit_price: i64) -> i64 {
  quantity.saturating_mul(unit_price)
}

/// Store-wide pricing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
  pub currency:                String,
  /// Subtotals at or above this amount ship for free.
  pub free_shipping_threshold: i64,
  /// Flat fee charged below the free-shipping threshold.
  pub flat_shipping_fee:       i64,
}

impl Default for Pricing {
  fn default() -> Self {
    Self {
      currency:                "usd".to_owned(),
      free_shipping_threshold: 25_000,
      flat_shipping_fee:       1_200,
    }
  }
}

impl Pricing {
  /// An empty cart costs nothing to ship.
  pub fn shipping_for(&self, subtotal: i64) -> i64 {
    if subtotal == 0 || subtotal >= self.free_shipping_threshold {
      0
    } else {
      self.flat_shipping_fee
    }
  }

  /// Compute cart totals from the line totals of every line in the cart.
  ///
  /// Discount and tax are not computed yet and are always zero.
  pub fn totals(&self, line_totals: impl IntoIterator<Item = i64>) -> CartTotals {
    let subtotal: i64 = line_totals.into_iter().sum();
    let shipping = self.shipping_for(subtotal);
    CartTotals {
      subtotal,
      discount: 0,
      tax: 0,
      shipping,
      total: subtotal + shipping,
    }
  }
}

/// Monetary summary of a cart, in minor currency units.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
  pub subtotal: i64,
  pub discount: i64,
  pub tax:      i64,
  pub shipping: i64,
  pub total:    i64,
}
