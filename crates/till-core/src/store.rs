//! The `CommerceStore` trait: carts, pending orders and webhook
//! reconciliation.
//!
//! The trait is implemented by storage backends (e.g. `till-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.
//! Every method that mutates more than one row is expected to do so inside a
//! single transaction.

use std::future::Future;

use uuid::Uuid;

use crate::{
  cart::{Cart, CartSummary},
  identity::{AccountId, SessionHandle},
  order::{Order, OrderItem, PendingOrderInput, PersistedOrder},
  payment::{CheckoutCompleted, CheckoutExpired, ReconcileOutcome},
};

/// Lets callers tell a missing row apart from a storage fault without
/// knowing the backend's concrete error type.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` when the failure means a referenced cart, line or variant does
  /// not exist.
  fn is_not_found(&self) -> bool;
}

/// Abstraction over the storefront's transactional store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait CommerceStore: Send + Sync {
  type Error: StoreError;

  // ── Carts ─────────────────────────────────────────────────────────────

  /// Find the active cart addressed by `session`, creating one if there is
  /// none. When `account` is known and the cart is unclaimed, the cart is
  /// claimed for it. Claims are never undone.
  fn get_or_create_cart(
    &self,
    session: SessionHandle,
    account: Option<AccountId>,
  ) -> impl Future<Output = Result<Cart, Self::Error>> + Send + '_;

  /// Resolve the caller's cart without creating one: the session's active
  /// cart first, else the account's most recently updated active cart.
  fn resolve_cart(
    &self,
    session: Option<SessionHandle>,
    account: Option<AccountId>,
  ) -> impl Future<Output = Result<Option<Cart>, Self::Error>> + Send + '_;

  /// Add `quantity` of a variant. Repeat adds sum into the existing line and
  /// are clamped. Errors if the variant does not exist.
  fn add_line(
    &self,
    cart_id: Uuid,
    variant_id: Uuid,
    quantity: i64,
  ) -> impl Future<Output = Result<Cart, Self::Error>> + Send + '_;

  /// Overwrite a line's quantity (clamped). A line outside the cart is
  /// ignored.
  fn update_line_quantity(
    &self,
    cart_id: Uuid,
    line_id: Uuid,
    quantity: i64,
  ) -> impl Future<Output = Result<Cart, Self::Error>> + Send + '_;

  /// Delete a line if it belongs to the cart.
  fn remove_line(
    &self,
    cart_id: Uuid,
    line_id: Uuid,
  ) -> impl Future<Output = Result<Cart, Self::Error>> + Send + '_;

  /// Recompute and persist the cart's totals from its lines. The only path
  /// that writes cart totals.
  fn recalculate_totals(
    &self,
    cart_id: Uuid,
  ) -> impl Future<Output = Result<Cart, Self::Error>> + Send + '_;

  /// The resolved cart joined with display data, or the empty shape.
  fn cart_summary(
    &self,
    session: Option<SessionHandle>,
    account: Option<AccountId>,
  ) -> impl Future<Output = Result<CartSummary, Self::Error>> + Send + '_;

  // ── Orders ────────────────────────────────────────────────────────────

  /// Turn a cart snapshot into the cart's single pending order, replacing
  /// the snapshot of an existing one in place.
  fn persist_pending_order(
    &self,
    input: PendingOrderInput,
  ) -> impl Future<Output = Result<PersistedOrder, Self::Error>> + Send + '_;

  /// Record the provider's hosted session id on an order.
  fn attach_payment_session(
    &self,
    order_id: Uuid,
    session_id: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_order(
    &self,
    order_id: Uuid,
  ) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send + '_;

  fn order_items(
    &self,
    order_id: Uuid,
  ) -> impl Future<Output = Result<Vec<OrderItem>, Self::Error>> + Send + '_;

  /// Orders for an account, most recently updated first.
  fn list_orders(
    &self,
    account: AccountId,
  ) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send + '_;

  /// Every order ever created for a cart, oldest first.
  fn orders_for_cart(
    &self,
    cart_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send + '_;

  // ── Reconciliation ────────────────────────────────────────────────────

  /// Mark the referenced order paid and, when a cart is referenced, convert
  /// and empty that cart. Both writes commit together or not at all.
  fn complete_checkout(
    &self,
    event: CheckoutCompleted,
  ) -> impl Future<Output = Result<ReconcileOutcome, Self::Error>> + Send + '_;

  /// Cancel the referenced order if it is still pending. The cart is left
  /// alone so the shopper can retry.
  fn expire_checkout(
    &self,
    event: CheckoutExpired,
  ) -> impl Future<Output = Result<ReconcileOutcome, Self::Error>> + Send + '_;

  /// Mark an account active. Returns `false` if the account is unknown.
  fn activate_account(
    &self,
    account: AccountId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
