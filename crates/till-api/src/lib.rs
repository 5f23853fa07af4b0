//! HTTP surface for the Till storefront pipeline.
//!
//! Exposes an axum [`Router`] backed by any store implementing
//! [`CommerceStore`] and [`ActivationGate`], and any [`PaymentProvider`].
//! TLS and the upstream auth layer are the caller's responsibility.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/cart` | Cart summary |
//! | `POST`   | `/cart/items` | `{"variantId": ..., "quantity": 2}` |
//! | `PATCH`  | `/cart/items/{id}` | `{"quantity": 3}` |
//! | `DELETE` | `/cart/items/{id}` | |
//! | `POST`   | `/checkout` | Form or JSON `{"locale": "en"}`; answers with a 303 |
//! | `POST`   | `/webhooks/payments` | Signed provider events |
//! | `GET`    | `/orders` | The signed-in account's orders |
//! | `GET`    | `/orders/{id}` | One order with its item snapshot |

pub mod cart;
pub mod checkout;
pub mod error;
pub mod identity;
pub mod orders;
pub mod webhook;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
  Router, middleware,
  routing::{get, patch, post},
};
use till_core::{
  account::ActivationGate, payment::PaymentProvider, store::CommerceStore,
};
use till_payments::WebhookVerifier;

pub use checkout::{CheckoutConfig, CheckoutError, CheckoutOutcome};
pub use error::ApiError;
pub use identity::{AccountResolver, IdentityConfig, TrustedHeader};

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, P> {
  pub store:    Arc<S>,
  pub payments: Arc<P>,
  pub webhooks: Arc<WebhookVerifier>,
  pub identity: Arc<IdentityConfig>,
  pub checkout: Arc<CheckoutConfig>,
}

impl<S, P> Clone for AppState<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      payments: self.payments.clone(),
      webhooks: self.webhooks.clone(),
      identity: self.identity.clone(),
      checkout: self.checkout.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the storefront router.
///
/// Shopper-facing routes run behind the identity middleware; the webhook
/// route does not, since the provider carries no session.
pub fn router<S, P>(state: AppState<S, P>) -> Router
where
  S: CommerceStore + ActivationGate + 'static,
  P: PaymentProvider + 'static,
{
  let shopper = Router::new()
    .route("/cart", get(cart::show::<S, P>))
    .route("/cart/items", post(cart::add::<S, P>))
    .route(
      "/cart/items/{id}",
      patch(cart::update::<S, P>).delete(cart::remove::<S, P>),
    )
    .route("/checkout", post(checkout::submit::<S, P>))
    .route("/orders", get(orders::list::<S, P>))
    .route("/orders/{id}", get(orders::get_one::<S, P>))
    .route_layer(middleware::from_fn_with_state(
      state.identity.clone(),
      identity::resolve,
    ));

  Router::new()
    .merge(shopper)
    .route("/webhooks/payments", post(webhook::receive::<S, P>))
    .with_state(state)
}
