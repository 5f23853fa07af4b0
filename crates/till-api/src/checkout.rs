//! Checkout orchestration: cart snapshot → pending order → hosted payment
//! page.
//!
//! Every early exit is a redirect, not an error. Re-submitting after a
//! failure is safe because the order upsert replaces the cart's pending
//! order in place.

use std::collections::BTreeMap;

use axum::{
  Extension, Form, Json,
  extract::{FromRequest, Request, State},
  http::header::CONTENT_TYPE,
  response::Redirect,
};
use serde::Deserialize;
use thiserror::Error;
use till_core::{
  account::ActivationGate,
  cart::CartSummary,
  identity::{AccountId, Identity},
  order::{PendingOrderInput, PendingOrderItem},
  payment::{
    HostedLineItem, HostedSessionRequest, METADATA_ACCOUNT_ID, METADATA_CART_ID,
    METADATA_ORDER_ID, PaymentProvider,
  },
  store::CommerceStore,
};
use tracing::{error, info};

use crate::{AppState, error::ApiError};

/// Placeholder the provider substitutes with the session id on redirect.
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
  /// Public origin of the storefront, e.g. `https://shop.example`.
  pub base_url:                   String,
  pub default_locale:             String,
  pub allowed_shipping_countries: Vec<String>,
}

impl CheckoutConfig {
  fn page(&self, locale: &str, path: &str) -> String {
    format!("{}/{locale}/{path}", self.base_url.trim_end_matches('/'))
  }

  /// Accept `[A-Za-z-]{2,10}`; anything else falls back to the default.
  pub fn sanitize_locale(&self, raw: Option<&str>) -> String {
    match raw.map(str::trim) {
      Some(locale)
        if (2..=10).contains(&locale.len())
          && locale.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-') =>
      {
        locale.to_owned()
      }
      _ => self.default_locale.clone(),
    }
  }
}

// ─── Outcome ──────────────────────────────────────────────────────────────────

/// Where checkout sends the browser next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
  SignIn,
  ActivationRequired,
  EmptyCart,
  /// The provider-hosted payment page.
  PaymentPage(String),
}

impl CheckoutOutcome {
  pub fn location(&self, config: &CheckoutConfig, locale: &str) -> String {
    match self {
      CheckoutOutcome::SignIn => format!(
        "{}?redirect_url=/{locale}/checkout",
        config.page(locale, "sign-in")
      ),
      CheckoutOutcome::ActivationRequired => config.page(locale, "onboarding"),
      CheckoutOutcome::EmptyCart => config.page(locale, "cart"),
      CheckoutOutcome::PaymentPage(url) => url.clone(),
    }
  }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("payment provider error: {0}")]
  Provider(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The provider opened a session but gave no page to send the shopper to.
  #[error("payment provider returned no redirect url for session {0}")]
  MissingRedirect(String),
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> CheckoutError {
  CheckoutError::Store(Box::new(e))
}

// ─── Orchestrator ─────────────────────────────────────────────────────────────

/// `"sku · size · color"`, skipping absent parts.
fn describe(item: &PendingOrderItem) -> Option<String> {
  let parts: Vec<&str> = [Some(item.sku.as_str()), item.size.as_deref(), item.color.as_deref()]
    .into_iter()
    .flatten()
    .filter(|p| !p.is_empty())
    .collect();
  (!parts.is_empty()).then(|| parts.join(" · "))
}

fn order_input(summary: &CartSummary, account: &AccountId) -> Option<PendingOrderInput> {
  let cart = summary.cart.as_ref()?;
  Some(PendingOrderInput {
    cart_id:        cart.id,
    account_id:     account.clone(),
    currency:       cart.currency.clone(),
    discount_total: summary.totals.discount,
    tax_total:      summary.totals.tax,
    totals:         summary.totals,
    items:          summary.items.iter().map(PendingOrderItem::from).collect(),
  })
}

/// Run checkout for `identity`, returning where the browser should go.
pub async fn create_checkout_session<S, P>(
  store: &S,
  payments: &P,
  config: &CheckoutConfig,
  identity: &Identity,
  locale: &str,
) -> Result<CheckoutOutcome, CheckoutError>
where
  S: CommerceStore + ActivationGate,
  P: PaymentProvider,
{
  let Some(account) = identity.account.clone() else {
    return Ok(CheckoutOutcome::SignIn);
  };

  let active = store
    .activation(account.clone())
    .await
    .map_err(store_err)?
    .is_some_and(|state| state.is_active);
  if !active {
    return Ok(CheckoutOutcome::ActivationRequired);
  }

  let summary = store
    .cart_summary(Some(identity.session.clone()), Some(account.clone()))
    .await
    .map_err(store_err)?;
  let Some(input) = order_input(&summary, &account).filter(|i| !i.items.is_empty())
  else {
    return Ok(CheckoutOutcome::EmptyCart);
  };

  let cart_id = input.cart_id;
  let currency = input.currency.clone();
  let shipping = input.totals.shipping;
  let mut line_items: Vec<HostedLineItem> = input
    .items
    .iter()
    .map(|item| HostedLineItem {
      name:        item.name.clone(),
      description: describe(item),
      unit_amount: item.unit_price,
      quantity:    item.quantity,
    })
    .collect();
  if shipping > 0 {
    line_items.push(HostedLineItem {
      name:        "Shipping".to_owned(),
      description: None,
      unit_amount: shipping,
      quantity:    1,
    });
  }

  let order = store.persist_pending_order(input).await.map_err(store_err)?;

  let request = HostedSessionRequest {
    currency,
    line_items,
    client_reference_id: order.order_number.to_string(),
    metadata: BTreeMap::from([
      (METADATA_ORDER_ID.to_owned(), order.order_id.to_string()),
      (METADATA_CART_ID.to_owned(), cart_id.to_string()),
      (METADATA_ACCOUNT_ID.to_owned(), account.to_string()),
    ]),
    allowed_shipping_countries: config.allowed_shipping_countries.clone(),
    success_url: format!(
      "{}?success=1&session_id={SESSION_ID_PLACEHOLDER}",
      config.page(locale, "checkout")
    ),
    cancel_url: format!("{}?canceled=1", config.page(locale, "checkout")),
    locale: Some(locale.to_owned()),
  };

  let session = payments.create_hosted_session(request).await.map_err(|e| {
    error!(order_number = %order.order_number, error = %e, "hosted session failed");
    CheckoutError::Provider(Box::new(e))
  })?;

  store
    .attach_payment_session(order.order_id, session.id.clone())
    .await
    .map_err(store_err)?;

  let Some(url) = session.url else {
    error!(
      order_number = %order.order_number,
      session_id = %session.id,
      "hosted session has no redirect url"
    );
    return Err(CheckoutError::MissingRedirect(session.id));
  };

  info!(
    order_number = %order.order_number,
    session_id = %session.id,
    "redirecting to hosted payment page"
  );
  Ok(CheckoutOutcome::PaymentPage(url))
}

// ─── Handler ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
  pub locale: Option<String>,
}

/// Accepts the checkout submission as JSON or as a urlencoded form.
pub struct CheckoutSubmission(pub CheckoutBody);

impl<T: Send + Sync> FromRequest<T> for CheckoutSubmission {
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &T) -> Result<Self, Self::Rejection> {
    let content_type = req
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .unwrap_or_default()
      .to_owned();

    if content_type.starts_with("application/json") {
      let Json(body) = Json::<CheckoutBody>::from_request(req, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
      Ok(Self(body))
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
      let Form(body) = Form::<CheckoutBody>::from_request(req, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
      Ok(Self(body))
    } else {
      Ok(Self(CheckoutBody::default()))
    }
  }
}

/// `POST /checkout`
pub async fn submit<S, P>(
  State(state): State<AppState<S, P>>,
  Extension(identity): Extension<Identity>,
  CheckoutSubmission(body): CheckoutSubmission,
) -> Result<Redirect, ApiError>
where
  S: CommerceStore + ActivationGate,
  P: PaymentProvider,
{
  let config = state.checkout.as_ref();
  let locale = config.sanitize_locale(body.locale.as_deref());
  let outcome = create_checkout_session(
    state.store.as_ref(),
    state.payments.as_ref(),
    config,
    &identity,
    &locale,
  )
  .await?;
  Ok(Redirect::to(&outcome.location(config, &locale)))
}
