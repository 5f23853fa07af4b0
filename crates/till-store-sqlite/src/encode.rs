//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order matches chronological order. UUIDs are stored as
//! hyphenated lowercase strings. Statuses are stored as snake_case text.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use till_core::{
  account::ActivationState,
  cart::{Cart, CartLine},
  identity::{AccountId, SessionHandle},
  order::{Order, OrderItem, OrderNumber},
  status::parse_status,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Column lists ─────────────────────────────────────────────────────────────

pub const CART_COLUMNS: &str = "cart_id, session_handle, account_id, currency, \
  subtotal, discount_total, tax_total, shipping_total, total, status, \
  created_at, updated_at";

pub const ORDER_COLUMNS: &str = "order_id, order_number, cart_id, account_id, \
  status, payment_status, fulfillment_status, subtotal, discount_total, \
  tax_total, shipping_total, total, currency, payment_session_id, \
  payment_intent_id, placed_at, created_at, updated_at";

pub const ORDER_ITEM_COLUMNS: &str = "order_item_id, order_id, product_id, \
  variant_id, name, sku, size, color, quantity, unit_price, line_total, \
  snapshot";

// ─── Row types ────────────────────────────────────────────────────────────────

/// Raw values read directly from a `carts` row.
pub struct RawCart {
  pub cart_id:        String,
  pub session_handle: Option<String>,
  pub account_id:     Option<String>,
  pub currency:       String,
  pub subtotal:       i64,
  pub discount_total: i64,
  pub tax_total:      i64,
  pub shipping_total: i64,
  pub total:          i64,
  pub status:         String,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawCart {
  /// Read a row selected with [`CART_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      cart_id:        row.get(0)?,
      session_handle: row.get(1)?,
      account_id:     row.get(2)?,
      currency:       row.get(3)?,
      subtotal:       row.get(4)?,
      discount_total: row.get(5)?,
      tax_total:      row.get(6)?,
      shipping_total: row.get(7)?,
      total:          row.get(8)?,
      status:         row.get(9)?,
      created_at:     row.get(10)?,
      updated_at:     row.get(11)?,
    })
  }

  pub fn into_cart(self) -> Result<Cart> {
    Ok(Cart {
      id:             decode_uuid(&self.cart_id)?,
      session_handle: self
        .session_handle
        .as_deref()
        .map(SessionHandle::parse)
        .transpose()?,
      account_id:     self.account_id.map(AccountId::new),
      currency:       self.currency,
      subtotal:       self.subtotal,
      discount_total: self.discount_total,
      tax_total:      self.tax_total,
      shipping_total: self.shipping_total,
      total:          self.total,
      status:         parse_status("cart status", &self.status)?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values from `cart_items` joined with catalog tables.
pub struct RawCartLine {
  pub cart_item_id:  String,
  pub variant_id:    String,
  pub product_id:    String,
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

impl RawCartLine {
  pub fn into_line(self) -> Result<CartLine> {
    Ok(CartLine {
      id:            decode_uuid(&self.cart_item_id)?,
      variant_id:    decode_uuid(&self.variant_id)?,
      product_id:    decode_uuid(&self.product_id)?,
      product_name:  self.product_name,
      product_slug:  self.product_slug,
      image_url:     self.image_url,
      sku:           self.sku,
      size:          self.size,
      color:         self.color,
      category_name: self.category_name,
      category_slug: self.category_slug,
      quantity:      self.quantity,
      unit_price:    self.unit_price,
      line_total:    self.line_total,
    })
  }
}

/// Raw values read directly from an `orders` row.
pub struct RawOrder {
  pub order_id:           String,
  pub order_number:       String,
  pub cart_id:            Option<String>,
  pub account_id:         String,
  pub status:             String,
  pub payment_status:     String,
  pub fulfillment_status: String,
  pub subtotal:           i64,
  pub discount_total:     i64,
  pub tax_total:          i64,
  pub shipping_total:     i64,
  pub total:              i64,
  pub currency:           String,
  pub payment_session_id: Option<String>,
  pub payment_intent_id:  Option<String>,
  pub placed_at:          Option<String>,
  pub created_at:         String,
  pub updated_at:         String,
}

impl RawOrder {
  /// Read a row selected with [`ORDER_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      order_id:           row.get(0)?,
      order_number:       row.get(1)?,
      cart_id:            row.get(2)?,
      account_id:         row.get(3)?,
      status:             row.get(4)?,
      payment_status:     row.get(5)?,
      fulfillment_status: row.get(6)?,
      subtotal:           row.get(7)?,
      discount_total:     row.get(8)?,
      tax_total:          row.get(9)?,
      shipping_total:     row.get(10)?,
      total:              row.get(11)?,
      currency:           row.get(12)?,
      payment_session_id: row.get(13)?,
      payment_intent_id:  row.get(14)?,
      placed_at:          row.get(15)?,
      created_at:         row.get(16)?,
      updated_at:         row.get(17)?,
    })
  }

  pub fn into_order(self) -> Result<Order> {
    Ok(Order {
      id:                 decode_uuid(&self.order_id)?,
      order_number:       OrderNumber::from_stored(self.order_number),
      cart_id:            decode_opt_uuid(self.cart_id.as_deref())?,
      account_id:         AccountId::new(self.account_id),
      status:             parse_status("order status", &self.status)?,
      payment_status:     parse_status("payment status", &self.payment_status)?,
      fulfillment_status: parse_status(
        "fulfillment status",
        &self.fulfillment_status,
      )?,
      subtotal:           self.subtotal,
      discount_total:     self.discount_total,
      tax_total:          self.tax_total,
      shipping_total:     self.shipping_total,
      total:              self.total,
      currency:           self.currency,
      payment_session_id: self.payment_session_id,
      payment_intent_id:  self.payment_intent_id,
      placed_at:          decode_opt_dt(self.placed_at.as_deref())?,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from an `order_items` row.
pub struct RawOrderItem {
  pub order_item_id: String,
  pub order_id:      String,
  pub product_id:    String,
  pub variant_id:    String,
  pub name:          String,
  pub sku:           String,
  pub size:          Option<String>,
  pub color:         Option<String>,
  pub quantity:      i64,
  pub unit_price:    i64,
  pub line_total:    i64,
  pub snapshot:      String,
}

impl RawOrderItem {
  /// Read a row selected with [`ORDER_ITEM_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      order_item_id: row.get(0)?,
      order_id:      row.get(1)?,
      product_id:    row.get(2)?,
      variant_id:    row.get(3)?,
      name:          row.get(4)?,
      sku:           row.get(5)?,
      size:          row.get(6)?,
      color:         row.get(7)?,
      quantity:      row.get(8)?,
      unit_price:    row.get(9)?,
      line_total:    row.get(10)?,
      snapshot:      row.get(11)?,
    })
  }

  pub fn into_item(self) -> Result<OrderItem> {
    Ok(OrderItem {
      id:         decode_uuid(&self.order_item_id)?,
      order_id:   decode_uuid(&self.order_id)?,
      product_id: decode_uuid(&self.product_id)?,
      variant_id: decode_uuid(&self.variant_id)?,
      name:       self.name,
      sku:        self.sku,
      size:       self.size,
      color:      self.color,
      quantity:   self.quantity,
      unit_price: self.unit_price,
      line_total: self.line_total,
      snapshot:   serde_json::from_str(&self.snapshot)?,
    })
  }
}

/// Raw values read directly from an `accounts` row.
pub struct RawActivation {
  pub is_active:               bool,
  pub has_accepted_terms:      bool,
  pub onboarding_completed_at: Option<String>,
  pub email_verified:          bool,
}

impl RawActivation {
  pub fn into_state(self) -> Result<ActivationState> {
    Ok(ActivationState {
      is_active:               self.is_active,
      has_accepted_terms:      self.has_accepted_terms,
      onboarding_completed_at: decode_opt_dt(
        self.onboarding_completed_at.as_deref(),
      )?,
      email_verified:          self.email_verified,
    })
  }
}
