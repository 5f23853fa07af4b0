//! Synchronous query helpers run on the `tokio-rusqlite` connection thread.
//!
//! Each helper takes a plain [`Connection`]; callers that need atomicity pass
//! a [`rusqlite::Transaction`], which derefs to one. Helpers never commit.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension as _, params};
use till_core::{
  account::ActivationState,
  cart::{Cart, CartLine},
  catalog::{Product, ProductVariant},
  order::{Order, OrderItem, OrderNumber, PendingOrderInput, PersistedOrder},
  payment::{CheckoutCompleted, CheckoutExpired, ReconcileOutcome},
  pricing::{Pricing, clamp_quantity, line_total},
  status::{CartStatus, FulfillmentStatus, OrderStatus, PaymentStatus},
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    CART_COLUMNS, ORDER_COLUMNS, ORDER_ITEM_COLUMNS, RawActivation, RawCart,
    RawCartLine, RawOrder, RawOrderItem, decode_uuid, encode_dt, encode_uuid,
  },
};

// ─── Carts ────────────────────────────────────────────────────────────────────

pub fn cart_by_id(conn: &Connection, cart_id: Uuid) -> Result<Option<Cart>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CART_COLUMNS} FROM carts WHERE cart_id = ?1"),
      params![encode_uuid(cart_id)],
      RawCart::from_row,
    )
    .optional()?;
  raw.map(RawCart::into_cart).transpose()
}

/// Like [`cart_by_id`], but the cart must exist and still be active.
pub fn active_cart(conn: &Connection, cart_id: Uuid) -> Result<Cart> {
  let cart = cart_by_id(conn, cart_id)?.ok_or(Error::CartNotFound(cart_id))?;
  if cart.status != CartStatus::Active {
    return Err(Error::CartNotActive(cart_id));
  }
  Ok(cart)
}

pub fn active_cart_by_session(
  conn: &Connection,
  session: &str,
) -> Result<Option<Cart>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {CART_COLUMNS} FROM carts
         WHERE session_handle = ?1 AND status = 'active'"
      ),
      params![session],
      RawCart::from_row,
    )
    .optional()?;
  raw.map(RawCart::into_cart).transpose()
}

pub fn latest_active_cart_by_account(
  conn: &Connection,
  account: &str,
) -> Result<Option<Cart>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {CART_COLUMNS} FROM carts
         WHERE account_id = ?1 AND status = 'active'
         ORDER BY updated_at DESC, rowid DESC
         LIMIT 1"
      ),
      params![account],
      RawCart::from_row,
    )
    .optional()?;
  raw.map(RawCart::into_cart).transpose()
}

pub fn insert_cart(
  conn: &Connection,
  session: Option<&str>,
  account: Option<&str>,
  currency: &str,
  now: DateTime<Utc>,
) -> Result<Cart> {
  let cart_id = Uuid::new_v4();
  let at = encode_dt(now);
  conn.execute(
    "INSERT INTO carts (cart_id, session_handle, account_id, currency, status,
                        created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?5)",
    params![encode_uuid(cart_id), session, account, currency, at],
  )?;
  cart_by_id(conn, cart_id)?.ok_or(Error::CartNotFound(cart_id))
}

/// Attach an account to an unclaimed cart. Returns `true` if a claim was
/// made; an already-claimed cart is never reassigned.
pub fn claim_cart(
  conn: &Connection,
  cart_id: Uuid,
  account: &str,
  now: DateTime<Utc>,
) -> Result<bool> {
  let changed = conn.execute(
    "UPDATE carts SET account_id = ?1, updated_at = ?2
     WHERE cart_id = ?3 AND account_id IS NULL",
    params![account, encode_dt(now), encode_uuid(cart_id)],
  )?;
  Ok(changed > 0)
}

/// Recompute subtotal/shipping/total from the cart's lines and persist them.
///
/// This is the only function that writes cart totals.
pub fn recalculate(
  conn: &Connection,
  cart_id: Uuid,
  pricing: &Pricing,
  now: DateTime<Utc>,
) -> Result<Cart> {
  let id = encode_uuid(cart_id);
  let line_totals = {
    let mut stmt =
      conn.prepare("SELECT line_total FROM cart_items WHERE cart_id = ?1")?;
    stmt
      .query_map(params![id], |row| row.get::<_, i64>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };
  let totals = pricing.totals(line_totals);

  let changed = conn.execute(
    "UPDATE carts
     SET subtotal = ?1, discount_total = ?2, tax_total = ?3,
         shipping_total = ?4, total = ?5, updated_at = ?6
     WHERE cart_id = ?7",
    params![
      totals.subtotal,
      totals.discount,
      totals.tax,
      totals.shipping,
      totals.total,
      encode_dt(now),
      id,
    ],
  )?;
  if changed == 0 {
    return Err(Error::CartNotFound(cart_id));
  }
  cart_by_id(conn, cart_id)?.ok_or(Error::CartNotFound(cart_id))
}

pub fn cart_lines(conn: &Connection, cart_id: Uuid) -> Result<Vec<CartLine>> {
  let mut stmt = conn.prepare(
    "SELECT ci.cart_item_id, ci.variant_id, p.product_id, p.name, p.slug,
            p.image_url, v.sku, v.size, v.color, c.name, c.slug,
            ci.quantity, ci.unit_price, ci.line_total
     FROM cart_items ci
     JOIN product_variants v ON v.variant_id  = ci.variant_id
     JOIN products p         ON p.product_id  = v.product_id
     LEFT JOIN categories c  ON c.category_id = p.category_id
     WHERE ci.cart_id = ?1
     ORDER BY ci.created_at, ci.rowid",
  )?;
  let raws = stmt
    .query_map(params![encode_uuid(cart_id)], |row| {
      Ok(RawCartLine {
        cart_item_id:  row.get(0)?,
        variant_id:    row.get(1)?,
        product_id:    row.get(2)?,
        product_name:  row.get(3)?,
        product_slug:  row.get(4)?,
        image_url:     row.get(5)?,
        sku:           row.get(6)?,
        size:          row.get(7)?,
        color:         row.get(8)?,
        category_name: row.get(9)?,
        category_slug: row.get(10)?,
        quantity:      row.get(11)?,
        unit_price:    row.get(12)?,
        line_total:    row.get(13)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawCartLine::into_line).collect()
}

// ─── Cart lines ───────────────────────────────────────────────────────────────

pub fn get_product(conn: &Connection, product_id: Uuid) -> Result<Option<Product>> {
  let raw = conn
    .query_row(
      "SELECT product_id, category_id, name, slug, description, base_price,
              image_url
       FROM products WHERE product_id = ?1",
      params![encode_uuid(product_id)],
      |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, Option<String>>(1)?,
          row.get::<_, String>(2)?,
          row.get::<_, String>(3)?,
          row.get::<_, Option<String>>(4)?,
          row.get::<_, i64>(5)?,
          row.get::<_, Option<String>>(6)?,
        ))
      },
    )
    .optional()?;

  raw
    .map(|(id, category_id, name, slug, description, base_price, image_url)| {
      Ok(Product {
        id: decode_uuid(&id)?,
        category_id: category_id.as_deref().map(decode_uuid).transpose()?,
        name,
        slug,
        description,
        base_price,
        image_url,
      })
    })
    .transpose()
}

pub fn get_variant(
  conn: &Connection,
  variant_id: Uuid,
) -> Result<Option<ProductVariant>> {
  let raw = conn
    .query_row(
      "SELECT variant_id, product_id, sku, size, color, price_override
       FROM product_variants WHERE variant_id = ?1",
      params![encode_uuid(variant_id)],
      |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, String>(2)?,
          row.get::<_, Option<String>>(3)?,
          row.get::<_, Option<String>>(4)?,
          row.get::<_, Option<i64>>(5)?,
        ))
      },
    )
    .optional()?;

  raw
    .map(|(id, product_id, sku, size, color, price_override)| {
      Ok(ProductVariant {
        id: decode_uuid(&id)?,
        product_id: decode_uuid(&product_id)?,
        sku,
        size,
        color,
        price_override,
      })
    })
    .transpose()
}

/// Add `quantity` of a variant to an active cart, summing into an existing
/// line and clamping. Totals are recalculated before returning.
pub fn add_line(
  conn: &Connection,
  cart_id: Uuid,
  variant_id: Uuid,
  quantity: i64,
  pricing: &Pricing,
  now: DateTime<Utc>,
) -> Result<Cart> {
  active_cart(conn, cart_id)?;

  let variant =
    get_variant(conn, variant_id)?.ok_or(Error::VariantNotFound(variant_id))?;
  let product = get_product(conn, variant.product_id)?
    .ok_or(Error::VariantNotFound(variant_id))?;

  let cart_str = encode_uuid(cart_id);
  let variant_str = encode_uuid(variant_id);
  let at = encode_dt(now);

  let existing: Option<(String, i64, i64)> = conn
    .query_row(
      "SELECT cart_item_id, quantity, unit_price FROM cart_items
       WHERE cart_id = ?1 AND variant_id = ?2",
      params![cart_str, variant_str],
      |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()?;

  match existing {
    Some((item_id, current, unit_price)) => {
      let quantity = clamp_quantity(current.saturating_add(quantity));
      conn.execute(
        "UPDATE cart_items SET quantity = ?1, line_total = ?2, updated_at = ?3
         WHERE cart_item_id = ?4",
        params![quantity, line_total(quantity, unit_price), at, item_id],
      )?;
    }
    None => {
      let quantity = clamp_quantity(quantity);
      let unit_price = variant.effective_price(&product);
      conn.execute(
        "INSERT INTO cart_items (cart_item_id, cart_id, variant_id, quantity,
                                 unit_price, line_total, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
          encode_uuid(Uuid::new_v4()),
          cart_str,
          variant_str,
          quantity,
          unit_price,
          line_total(quantity, unit_price),
          at,
        ],
      )?;
    }
  }

  recalculate(conn, cart_id, pricing, now)
}

/// Overwrite a line's quantity. Lines that do not belong to the cart are
/// left alone and the cart is returned unchanged.
pub fn update_line_quantity(
  conn: &Connection,
  cart_id: Uuid,
  line_id: Uuid,
  quantity: i64,
  pricing: &Pricing,
  now: DateTime<Utc>,
) -> Result<Cart> {
  let cart = active_cart(conn, cart_id)?;

  let unit_price: Option<i64> = conn
    .query_row(
      "SELECT unit_price FROM cart_items WHERE cart_item_id = ?1 AND cart_id = ?2",
      params![encode_uuid(line_id), encode_uuid(cart_id)],
      |row| row.get(0),
    )
    .optional()?;

  let Some(unit_price) = unit_price else {
    return Ok(cart);
  };

  let quantity = clamp_quantity(quantity);
  conn.execute(
    "UPDATE cart_items SET quantity = ?1, line_total = ?2, updated_at = ?3
     WHERE cart_item_id = ?4 AND cart_id = ?5",
    params![
      quantity,
      line_total(quantity, unit_price),
      encode_dt(now),
      encode_uuid(line_id),
      encode_uuid(cart_id),
    ],
  )?;

  recalculate(conn, cart_id, pricing, now)
}

pub fn remove_line(
  conn: &Connection,
  cart_id: Uuid,
  line_id: Uuid,
  pricing: &Pricing,
  now: DateTime<Utc>,
) -> Result<Cart> {
  active_cart(conn, cart_id)?;
  conn.execute(
    "DELETE FROM cart_items WHERE cart_item_id = ?1 AND cart_id = ?2",
    params![encode_uuid(line_id), encode_uuid(cart_id)],
  )?;
  recalculate(conn, cart_id, pricing, now)
}

// ─── Orders ───────────────────────────────────────────────────────────────────

pub fn order_by_id(conn: &Connection, order_id: Uuid) -> Result<Option<Order>> {
  let raw = conn
    .query_row(
      &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
      params![encode_uuid(order_id)],
      RawOrder::from_row,
    )
    .optional()?;
  raw.map(RawOrder::into_order).transpose()
}

fn order_by_session(conn: &Connection, session_id: &str) -> Result<Option<Order>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE payment_session_id = ?1
         ORDER BY updated_at DESC
         LIMIT 1"
      ),
      params![session_id],
      RawOrder::from_row,
    )
    .optional()?;
  raw.map(RawOrder::into_order).transpose()
}

/// Resolve a webhook's order reference: the order id from metadata first,
/// then the hosted session id.
fn locate_order(
  conn: &Connection,
  order_id: Option<Uuid>,
  session_id: &str,
) -> Result<Option<Order>> {
  if let Some(id) = order_id {
    if let Some(order) = order_by_id(conn, id)? {
      return Ok(Some(order));
    }
  }
  if session_id.is_empty() {
    return Ok(None);
  }
  order_by_session(conn, session_id)
}

pub fn orders_where(
  conn: &Connection,
  clause: &str,
  value: &str,
) -> Result<Vec<Order>> {
  let mut stmt =
    conn.prepare(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {clause}"))?;
  let raws = stmt
    .query_map(params![value], RawOrder::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawOrder::into_order).collect()
}

pub fn order_items(conn: &Connection, order_id: Uuid) -> Result<Vec<OrderItem>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ORDER_ITEM_COLUMNS} FROM order_items
     WHERE order_id = ?1
     ORDER BY rowid"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(order_id)], RawOrderItem::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawOrderItem::into_item).collect()
}

/// The order a new checkout for `cart_id` should reuse: its pending order,
/// else its most recent order cancelled by payment-session expiry.
fn reusable_order(conn: &Connection, cart_id: &str) -> Result<Option<(String, String)>> {
  Ok(
    conn
      .query_row(
        "SELECT order_id, order_number FROM orders
         WHERE cart_id = ?1
           AND (status = 'pending'
                OR (status = 'cancelled' AND payment_status = 'failed'))
         ORDER BY CASE status WHEN 'pending' THEN 0 ELSE 1 END,
                  updated_at DESC
         LIMIT 1",
        params![cart_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?,
  )
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
  )
}

/// Create or replace the cart's single pending order and its line snapshot.
///
/// Must run inside a transaction: a failure while writing the snapshot
/// leaves no order behind.
pub fn persist_pending_order(
  conn: &Connection,
  input: &PendingOrderInput,
  now: DateTime<Utc>,
) -> Result<PersistedOrder> {
  if input.items.is_empty() {
    return Err(Error::EmptyOrder);
  }

  let cart_id = encode_uuid(input.cart_id);
  let at = encode_dt(now);
  let totals = input.totals;

  let (order_id, order_number, reused) = match reusable_order(conn, &cart_id)? {
    Some((order_id, order_number)) => {
      conn.execute(
        "DELETE FROM order_items WHERE order_id = ?1",
        params![order_id],
      )?;
      conn.execute(
        "UPDATE orders
         SET account_id = ?1, status = ?2, payment_status = ?3,
             fulfillment_status = ?4, subtotal = ?5, discount_total = ?6,
             tax_total = ?7, shipping_total = ?8, total = ?9, currency = ?10,
             payment_session_id = NULL, updated_at = ?11
         WHERE order_id = ?12",
        params![
          input.account_id.as_str(),
          OrderStatus::Pending.as_ref(),
          PaymentStatus::Pending.as_ref(),
          FulfillmentStatus::Pending.as_ref(),
          totals.subtotal,
          input.discount_total,
          input.tax_total,
          totals.shipping,
          totals.total,
          input.currency,
          at,
          order_id,
        ],
      )?;
      (decode_uuid(&order_id)?, OrderNumber::from_stored(order_number), true)
    }
    None => {
      let order_id = Uuid::new_v4();
      let order_number = OrderNumber::generate(now);
      conn
        .execute(
          "INSERT INTO orders (
             order_id, order_number, cart_id, account_id, status,
             payment_status, fulfillment_status, subtotal, discount_total,
             tax_total, shipping_total, total, currency, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
          params![
            encode_uuid(order_id),
            order_number.as_str(),
            cart_id,
            input.account_id.as_str(),
            OrderStatus::Pending.as_ref(),
            PaymentStatus::Pending.as_ref(),
            FulfillmentStatus::Pending.as_ref(),
            totals.subtotal,
            input.discount_total,
            input.tax_total,
            totals.shipping,
            totals.total,
            input.currency,
            at,
          ],
        )
        .map_err(|e| {
          if is_constraint_violation(&e) {
            Error::PendingOrderConflict(input.cart_id)
          } else {
            Error::Sqlite(e)
          }
        })?;
      (order_id, order_number, false)
    }
  };

  let order_str = encode_uuid(order_id);
  for item in &input.items {
    let snapshot = serde_json::to_string(&item.snapshot)?;
    conn
      .execute(
        "INSERT INTO order_items (
           order_item_id, order_id, product_id, variant_id, name, sku, size,
           color, quantity, unit_price, line_total, snapshot
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
          encode_uuid(Uuid::new_v4()),
          order_str,
          encode_uuid(item.product_id),
          encode_uuid(item.variant_id),
          item.name,
          item.sku,
          item.size,
          item.color,
          item.quantity,
          item.unit_price,
          line_total(item.quantity, item.unit_price),
          snapshot,
        ],
      )
      .map_err(Error::SnapshotFailed)?;
  }

  Ok(PersistedOrder { order_id, order_number, reused })
}

pub fn attach_payment_session(
  conn: &Connection,
  order_id: Uuid,
  session_id: &str,
  now: DateTime<Utc>,
) -> Result<bool> {
  let changed = conn.execute(
    "UPDATE orders SET payment_session_id = ?1, updated_at = ?2
     WHERE order_id = ?3",
    params![session_id, encode_dt(now), encode_uuid(order_id)],
  )?;
  Ok(changed > 0)
}

// ─── Reconciliation ───────────────────────────────────────────────────────────

/// Mark the order paid and, when the event names a cart, convert and empty
/// it. Must run inside a transaction.
///
/// Only `pending` and `cancelled` orders transition; anything already paid
/// is left as is so a redelivered event changes nothing.
pub fn complete_checkout(
  conn: &Connection,
  event: &CheckoutCompleted,
  pricing: &Pricing,
  now: DateTime<Utc>,
) -> Result<ReconcileOutcome> {
  let Some(order) = locate_order(conn, event.order_id, &event.session_id)? else {
    return Ok(ReconcileOutcome::NotFound);
  };

  let at = encode_dt(now);
  let order_changed = conn.execute(
    "UPDATE orders
     SET status = ?1, payment_status = ?2, fulfillment_status = ?3,
         payment_intent_id = COALESCE(?4, payment_intent_id),
         placed_at = ?5, updated_at = ?5
     WHERE order_id = ?6 AND status IN ('pending', 'cancelled')",
    params![
      OrderStatus::Paid.as_ref(),
      PaymentStatus::Succeeded.as_ref(),
      FulfillmentStatus::Processing.as_ref(),
      event.payment_intent_id,
      at,
      encode_uuid(order.id),
    ],
  )?;

  let mut cart_changed = 0;
  if let Some(cart_id) = event.cart_id {
    let id = encode_uuid(cart_id);
    cart_changed += conn.execute(
      "UPDATE carts SET status = ?1, updated_at = ?2
       WHERE cart_id = ?3 AND status != ?1",
      params![CartStatus::Converted.as_ref(), at, id],
    )?;
    cart_changed +=
      conn.execute("DELETE FROM cart_items WHERE cart_id = ?1", params![id])?;
    if cart_changed > 0 {
      recalculate(conn, cart_id, pricing, now)?;
    }
  }

  if order_changed + cart_changed > 0 {
    Ok(ReconcileOutcome::Applied)
  } else {
    Ok(ReconcileOutcome::AlreadyApplied)
  }
}

/// Cancel a still-pending order whose hosted session lapsed.
///
/// An expiry for a superseded hosted session (the order has since been
/// attached to a newer one) is ignored.
pub fn expire_checkout(
  conn: &Connection,
  event: &CheckoutExpired,
  now: DateTime<Utc>,
) -> Result<ReconcileOutcome> {
  let Some(order) = locate_order(conn, event.order_id, &event.session_id)? else {
    return Ok(ReconcileOutcome::NotFound);
  };

  let changed = conn.execute(
    "UPDATE orders
     SET status = ?1, payment_status = ?2, fulfillment_status = ?3,
         updated_at = ?4
     WHERE order_id = ?5
       AND status = 'pending'
       AND (payment_session_id IS NULL OR payment_session_id = ?6)",
    params![
      OrderStatus::Cancelled.as_ref(),
      PaymentStatus::Failed.as_ref(),
      FulfillmentStatus::Cancelled.as_ref(),
      encode_dt(now),
      encode_uuid(order.id),
      event.session_id,
    ],
  )?;

  if changed > 0 {
    Ok(ReconcileOutcome::Applied)
  } else {
    Ok(ReconcileOutcome::AlreadyApplied)
  }
}

// ─── Accounts ─────────────────────────────────────────────────────────────────

pub fn activation(conn: &Connection, account: &str) -> Result<Option<ActivationState>> {
  let raw = conn
    .query_row(
      "SELECT is_active, has_accepted_terms, onboarding_completed_at,
              email_verified
       FROM accounts WHERE account_id = ?1",
      params![account],
      |row| {
        Ok(RawActivation {
          is_active:               row.get(0)?,
          has_accepted_terms:      row.get(1)?,
          onboarding_completed_at: row.get(2)?,
          email_verified:          row.get(3)?,
        })
      },
    )
    .optional()?;
  raw.map(RawActivation::into_state).transpose()
}

pub fn activate_account(conn: &Connection, account: &str) -> Result<bool> {
  let changed = conn.execute(
    "UPDATE accounts SET is_active = 1 WHERE account_id = ?1",
    params![account],
  )?;
  Ok(changed > 0)
}
