//! [`SqliteStore`]: the SQLite implementation of [`CommerceStore`] and
//! [`ActivationGate`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior, params};
use till_core::{
  account::{ActivationGate, ActivationState},
  cart::{Cart, CartSummary},
  catalog::{Category, Product, ProductVariant},
  identity::{AccountId, SessionHandle},
  order::{Order, OrderItem, PendingOrderInput, PersistedOrder},
  payment::{CheckoutCompleted, CheckoutExpired, ReconcileOutcome},
  pricing::Pricing,
  store::CommerceStore,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{encode_dt, encode_uuid},
  queries,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A storefront store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  pricing: Pricing,
}

/// Run `f` inside a `BEGIN IMMEDIATE` transaction, committing only if it
/// succeeds. Dropping the uncommitted transaction rolls it back.
fn in_transaction<T>(
  conn: &mut Connection,
  f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let value = f(&tx)?;
  tx.commit()?;
  Ok(value)
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, pricing: Pricing::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, pricing: Pricing::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the pricing parameters used when recalculating cart totals.
  pub fn with_pricing(mut self, pricing: Pricing) -> Self {
    self.pricing = pricing;
    self
  }

  pub fn pricing(&self) -> &Pricing { &self.pricing }

  /// Close the underlying connection, waiting for queued calls to finish.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread inside one transaction.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(in_transaction(conn, f))).await?
  }

  /// Run `f` on the connection thread without opening a transaction.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  // ── Catalog and account seeding ─────────────────────────────────────────

  pub async fn insert_category(&self, category: Category) -> Result<()> {
    self
      .write(move |conn| {
        conn.execute(
          "INSERT INTO categories (category_id, name, slug) VALUES (?1, ?2, ?3)",
          params![encode_uuid(category.id), category.name, category.slug],
        )?;
        Ok(())
      })
      .await
  }

  pub async fn insert_product(&self, product: Product) -> Result<()> {
    self
      .write(move |conn| {
        conn.execute(
          "INSERT INTO products (product_id, category_id, name, slug,
                                 description, base_price, image_url)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![
            encode_uuid(product.id),
            product.category_id.map(encode_uuid),
            product.name,
            product.slug,
            product.description,
            product.base_price,
            product.image_url,
          ],
        )?;
        Ok(())
      })
      .await
  }

  pub async fn insert_variant(&self, variant: ProductVariant) -> Result<()> {
    self
      .write(move |conn| {
        conn.execute(
          "INSERT INTO product_variants (variant_id, product_id, sku, size,
                                         color, price_override)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            encode_uuid(variant.id),
            encode_uuid(variant.product_id),
            variant.sku,
            variant.size,
            variant.color,
            variant.price_override,
          ],
        )?;
        Ok(())
      })
      .await
  }

  /// Insert or overwrite the local activation mirror for an account.
  pub async fn upsert_account(
    &self,
    account: AccountId,
    state: ActivationState,
  ) -> Result<()> {
    let onboarded = state.onboarding_completed_at.map(encode_dt);
    self
      .write(move |conn| {
        conn.execute(
          "INSERT INTO accounts (account_id, is_active, has_accepted_terms,
                                 onboarding_completed_at, email_verified)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (account_id) DO UPDATE SET
             is_active               = excluded.is_active,
             has_accepted_terms      = excluded.has_accepted_terms,
             onboarding_completed_at = excluded.onboarding_completed_at,
             email_verified          = excluded.email_verified",
          params![
            account.as_str(),
            state.is_active,
            state.has_accepted_terms,
            onboarded,
            state.email_verified,
          ],
        )?;
        Ok(())
      })
      .await
  }

  // ── Inspection ──────────────────────────────────────────────────────────

  /// A cart by id in any status, with its lines. Unlike
  /// [`CommerceStore::cart_summary`] this also reaches converted carts.
  pub async fn cart_snapshot(&self, cart_id: Uuid) -> Result<Option<CartSummary>> {
    self
      .read(move |conn| {
        let Some(cart) = queries::cart_by_id(conn, cart_id)? else {
          return Ok(None);
        };
        let items = queries::cart_lines(conn, cart_id)?;
        Ok(Some(CartSummary { totals: cart.totals(), cart: Some(cart), items }))
      })
      .await
  }
}

fn resolve_cart_sync(
  conn: &Connection,
  session: Option<&SessionHandle>,
  account: Option<&AccountId>,
) -> Result<Option<Cart>> {
  if let Some(session) = session {
    if let Some(cart) = queries::active_cart_by_session(conn, session.as_str())? {
      return Ok(Some(cart));
    }
  }
  match account {
    Some(account) => queries::latest_active_cart_by_account(conn, account.as_str()),
    None => Ok(None),
  }
}

// ─── CommerceStore impl ──────────────────────────────────────────────────────

impl CommerceStore for SqliteStore {
  type Error = Error;

  // ── Carts ─────────────────────────────────────────────────────────────────

  async fn get_or_create_cart(
    &self,
    session: SessionHandle,
    account: Option<AccountId>,
  ) -> Result<Cart> {
    let currency = self.pricing.currency.clone();
    self
      .write(move |conn| {
        let now = Utc::now();
        let account = account.as_ref().map(AccountId::as_str);

        let Some(cart) = queries::active_cart_by_session(conn, session.as_str())?
        else {
          let cart =
            queries::insert_cart(conn, Some(session.as_str()), account, &currency, now)?;
          debug!(cart_id = %cart.id, "created cart");
          return Ok(cart);
        };

        match (account, &cart.account_id) {
          (Some(account), None) => {
            queries::claim_cart(conn, cart.id, account, now)?;
            info!(cart_id = %cart.id, account_id = account, "claimed cart");
            queries::cart_by_id(conn, cart.id)?.ok_or(Error::CartNotFound(cart.id))
          }
          _ => Ok(cart),
        }
      })
      .await
  }

  async fn resolve_cart(
    &self,
    session: Option<SessionHandle>,
    account: Option<AccountId>,
  ) -> Result<Option<Cart>> {
    self
      .read(move |conn| resolve_cart_sync(conn, session.as_ref(), account.as_ref()))
      .await
  }

  async fn add_line(
    &self,
    cart_id: Uuid,
    variant_id: Uuid,
    quantity: i64,
  ) -> Result<Cart> {
    let pricing = self.pricing.clone();
    self
      .write(move |conn| {
        queries::add_line(conn, cart_id, variant_id, quantity, &pricing, Utc::now())
      })
      .await
  }

  async fn update_line_quantity(
    &self,
    cart_id: Uuid,
    line_id: Uuid,
    quantity: i64,
  ) -> Result<Cart> {
    let pricing = self.pricing.clone();
    self
      .write(move |conn| {
        queries::update_line_quantity(conn, cart_id, line_id, quantity, &pricing, Utc::now())
      })
      .await
  }

  async fn remove_line(&self, cart_id: Uuid, line_id: Uuid) -> Result<Cart> {
    let pricing = self.pricing.clone();
    self
      .write(move |conn| queries::remove_line(conn, cart_id, line_id, &pricing, Utc::now()))
      .await
  }

  async fn recalculate_totals(&self, cart_id: Uuid) -> Result<Cart> {
    let pricing = self.pricing.clone();
    self
      .write(move |conn| queries::recalculate(conn, cart_id, &pricing, Utc::now()))
      .await
  }

  async fn cart_summary(
    &self,
    session: Option<SessionHandle>,
    account: Option<AccountId>,
  ) -> Result<CartSummary> {
    self
      .read(move |conn| {
        let Some(cart) = resolve_cart_sync(conn, session.as_ref(), account.as_ref())?
        else {
          return Ok(CartSummary::empty());
        };
        let items = queries::cart_lines(conn, cart.id)?;
        Ok(CartSummary { totals: cart.totals(), cart: Some(cart), items })
      })
      .await
  }

  // ── Orders ────────────────────────────────────────────────────────────────

  async fn persist_pending_order(
    &self,
    input: PendingOrderInput,
  ) -> Result<PersistedOrder> {
    let first = input.clone();
    let attempt = self
      .write(move |conn| queries::persist_pending_order(conn, &first, Utc::now()))
      .await;

    let persisted = match attempt {
      Err(Error::PendingOrderConflict(cart_id)) => {
        warn!(%cart_id, "pending order insert conflicted; retrying in place");
        self
          .write(move |conn| queries::persist_pending_order(conn, &input, Utc::now()))
          .await?
      }
      other => other?,
    };

    info!(
      order_id = %persisted.order_id,
      order_number = %persisted.order_number,
      reused = persisted.reused,
      "persisted pending order"
    );
    Ok(persisted)
  }

  async fn attach_payment_session(
    &self,
    order_id: Uuid,
    session_id: String,
  ) -> Result<()> {
    let attached = self
      .write(move |conn| {
        queries::attach_payment_session(conn, order_id, &session_id, Utc::now())
      })
      .await?;
    if !attached {
      warn!(%order_id, "payment session attached to unknown order");
    }
    Ok(())
  }

  async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
    self.read(move |conn| queries::order_by_id(conn, order_id)).await
  }

  async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
    self.read(move |conn| queries::order_items(conn, order_id)).await
  }

  async fn list_orders(&self, account: AccountId) -> Result<Vec<Order>> {
    self
      .read(move |conn| {
        queries::orders_where(
          conn,
          "account_id = ?1 ORDER BY updated_at DESC, rowid DESC",
          account.as_str(),
        )
      })
      .await
  }

  async fn orders_for_cart(&self, cart_id: Uuid) -> Result<Vec<Order>> {
    self
      .read(move |conn| {
        queries::orders_where(
          conn,
          "cart_id = ?1 ORDER BY created_at, rowid",
          &encode_uuid(cart_id),
        )
      })
      .await
  }

  // ── Reconciliation ────────────────────────────────────────────────────────

  async fn complete_checkout(
    &self,
    event: CheckoutCompleted,
  ) -> Result<ReconcileOutcome> {
    let pricing = self.pricing.clone();
    self
      .write(move |conn| queries::complete_checkout(conn, &event, &pricing, Utc::now()))
      .await
  }

  async fn expire_checkout(&self, event: CheckoutExpired) -> Result<ReconcileOutcome> {
    self
      .write(move |conn| queries::expire_checkout(conn, &event, Utc::now()))
      .await
  }

  async fn activate_account(&self, account: AccountId) -> Result<bool> {
    self
      .write(move |conn| queries::activate_account(conn, account.as_str()))
      .await
  }
}

// ─── ActivationGate impl ─────────────────────────────────────────────────────

impl ActivationGate for SqliteStore {
  type Error = Error;

  async fn activation(&self, account: AccountId) -> Result<Option<ActivationState>> {
    self
      .read(move |conn| queries::activation(conn, account.as_str()))
      .await
  }
}
