//! Catalog read model consumed by the cart.
//!
//! Catalog rows are maintained by seeding and admin tooling; the pipeline
//! only reads them to price lines and decorate cart summaries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  pub id:   Uuid,
  pub name: String,
  pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id:          Uuid,
  pub category_id: Option<Uuid>,
  pub name:        String,
  pub slug:        String,
  pub description: Option<String>,
  /// Base price in minor currency units.
  pub base_price:  i64,
  pub image_url:   Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
  pub id:             Uuid,
  pub product_id:     Uuid,
  pub sku:            String,
  pub size:           Option<String>,
  pub color:          Option<String>,
  /// Overrides the product's base price when set.
  pub price_override: Option<i64>,
}

impl ProductVariant {
  /// The price a cart line snapshots for this variant.
  pub fn effective_price(&self, product: &Product) -> i64 {
    self.price_override.unwrap_or(product.base_price)
  }
}
