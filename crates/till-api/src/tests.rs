//! Router-level tests against an in-memory SQLite store and a fake payment
//! provider.

use std::sync::{Arc, Mutex};

use axum::{
  Router,
  body::Body,
  http::{HeaderName, Request, StatusCode, header},
  response::Response,
};
use serde_json::{Value, json};
use till_core::{
  account::{ActivationGate, ActivationState},
  cart::{Cart, CartSummary},
  catalog::{Product, ProductVariant},
  identity::{AccountId, SessionHandle},
  order::{Order, OrderItem, PendingOrderInput, PersistedOrder},
  payment::{
    CheckoutCompleted, CheckoutExpired, HostedSession, HostedSessionRequest,
    PaymentProvider, ReconcileOutcome,
  },
  status::{CartStatus, OrderStatus, PaymentStatus},
  store::{CommerceStore, StoreError},
};
use till_payments::WebhookVerifier;
use till_store_sqlite::SqliteStore;
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, CheckoutConfig, IdentityConfig, TrustedHeader, router};

const SECRET: &str = "whsec_router_tests";
const ACCOUNT_HEADER: &str = "x-account-id";

// ─── Fake provider ────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("provider unavailable")]
struct ProviderDown;

#[derive(Default)]
struct FakeProvider {
  /// `None` simulates a session created without a redirect url.
  url:      Option<String>,
  down:     bool,
  requests: Mutex<Vec<HostedSessionRequest>>,
}

impl FakeProvider {
  fn redirecting() -> Self {
    Self { url: Some("https://pay.test/session".into()), ..Self::default() }
  }

  fn last_request(&self) -> HostedSessionRequest {
    self.requests.lock().unwrap().last().cloned().expect("a recorded request")
  }
}

impl PaymentProvider for FakeProvider {
  type Error = ProviderDown;

  async fn create_hosted_session(
    &self,
    request: HostedSessionRequest,
  ) -> Result<HostedSession, ProviderDown> {
    let mut requests = self.requests.lock().unwrap();
    requests.push(request);
    if self.down {
      return Err(ProviderDown);
    }
    Ok(HostedSession {
      id:  format!("cs_test_{}", requests.len()),
      url: self.url.clone(),
    })
  }
}

// ─── Harness ──────────────────────────────────────────────────────────────────

struct Harness {
  app:      Router,
  store:    Arc<SqliteStore>,
  payments: Arc<FakeProvider>,
  variant:  Uuid,
}

async fn harness_with(provider: FakeProvider) -> Harness {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());

  let product = Product {
    id:          Uuid::new_v4(),
    category_id: None,
    name:        "Wool Beanie".into(),
    slug:        "wool-beanie".into(),
    description: None,
    base_price:  10_000,
    image_url:   None,
  };
  let variant = ProductVariant {
    id:             Uuid::new_v4(),
    product_id:     product.id,
    sku:            "WB-OS-GRY".into(),
    size:           None,
    color:          Some("Grey".into()),
    price_override: None,
  };
  let variant_id = variant.id;
  store.insert_product(product).await.unwrap();
  store.insert_variant(variant).await.unwrap();

  let payments = Arc::new(provider);
  let state = AppState {
    store:    store.clone(),
    payments: payments.clone(),
    webhooks: Arc::new(WebhookVerifier::new(SECRET, 300).unwrap()),
    identity: Arc::new(IdentityConfig {
      cookie_name:   "till_session".into(),
      cookie_secure: false,
      accounts:      Arc::new(TrustedHeader {
        name: HeaderName::from_static(ACCOUNT_HEADER),
      }),
    }),
    checkout: Arc::new(CheckoutConfig {
      base_url:                   "https://shop.test".into(),
      default_locale:             "en".into(),
      allowed_shipping_countries: vec!["US".into(), "CA".into()],
    }),
  };

  Harness { app: router(state), store, payments, variant: variant_id }
}

async fn harness() -> Harness { harness_with(FakeProvider::redirecting()).await }

async fn activate(h: &Harness, account: &str) {
  h.store
    .upsert_account(AccountId::new(account), ActivationState {
      is_active: true,
      ..ActivationState::default()
    })
    .await
    .unwrap();
}

/// A shopper: a cookie jar of one and an optional signed-in account.
struct Shopper {
  cookie:  Option<String>,
  account: Option<&'static str>,
}

impl Shopper {
  fn anonymous() -> Self { Self { cookie: None, account: None } }

  fn signed_in(account: &'static str) -> Self {
    Self { cookie: None, account: Some(account) }
  }

  async fn send(
    &mut self,
    h: &Harness,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> Response {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(cookie) = &self.cookie {
      req = req.header(header::COOKIE, cookie);
    }
    if let Some(account) = self.account {
      req = req.header(ACCOUNT_HEADER, account);
    }
    let req = match body {
      Some(json) => req
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string())),
      None => req.body(Body::empty()),
    }
    .unwrap();

    let resp = h.app.clone().oneshot(req).await.unwrap();
    if let Some(set) = resp.headers().get(header::SET_COOKIE) {
      let pair = set.to_str().unwrap().split(';').next().unwrap().to_owned();
      self.cookie = Some(pair);
    }
    resp
  }

  async fn checkout(&mut self, h: &Harness, locale: &str) -> Response {
    let mut req = Request::builder()
      .method("POST")
      .uri("/checkout")
      .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = &self.cookie {
      req = req.header(header::COOKIE, cookie);
    }
    if let Some(account) = self.account {
      req = req.header(ACCOUNT_HEADER, account);
    }
    let req = req.body(Body::from(format!("locale={locale}"))).unwrap();
    h.app.clone().oneshot(req).await.unwrap()
  }
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn location(resp: &Response) -> &str {
  resp.headers()[header::LOCATION].to_str().unwrap()
}

async fn post_webhook(h: &Harness, payload: &Value, signature: Option<String>) -> Response {
  let body = payload.to_string();
  let mut req = Request::builder()
    .method("POST")
    .uri("/webhooks/payments")
    .header(header::CONTENT_TYPE, "application/json");
  if let Some(signature) = signature {
    req = req.header("stripe-signature", signature);
  }
  let req = req.body(Body::from(body)).unwrap();
  h.app.clone().oneshot(req).await.unwrap()
}

fn sign(payload: &Value) -> String {
  WebhookVerifier::new(SECRET, 300)
    .unwrap()
    .sign(payload.to_string().as_bytes(), chrono::Utc::now().timestamp())
}

// ─── Identity ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_cookie_is_minted_once() {
  let h = harness().await;
  let mut shopper = Shopper::anonymous();

  let first = shopper.send(&h, "GET", "/cart", None).await;
  assert_eq!(first.status(), StatusCode::OK);
  let cookie = first.headers()[header::SET_COOKIE].to_str().unwrap();
  assert!(cookie.starts_with("till_session="));
  assert!(cookie.contains("HttpOnly"));

  let second = shopper.send(&h, "GET", "/cart", None).await;
  assert!(second.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn webhooks_do_not_mint_sessions() {
  let h = harness().await;
  let payload = json!({ "id": "evt_x", "type": "invoice.paid", "data": { "object": {} } });
  let resp = post_webhook(&h, &payload, Some(sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert!(resp.headers().get(header::SET_COOKIE).is_none());
}

// ─── Cart ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_cart_summary_shape() {
  let h = harness().await;
  let body = json_body(Shopper::anonymous().send(&h, "GET", "/cart", None).await).await;

  assert_eq!(body["cart"], Value::Null);
  assert_eq!(body["items"], json!([]));
  assert_eq!(body["totals"]["subtotal"], 0);
  assert_eq!(body["totals"]["shipping"], 0);
  assert_eq!(body["totals"]["total"], 0);
}

#[tokio::test]
async fn cart_lines_can_be_added_updated_and_removed() {
  let h = harness().await;
  let mut shopper = Shopper::anonymous();

  let resp = shopper
    .send(&h, "POST", "/cart/items", Some(json!({ "variantId": h.variant, "quantity": 2 })))
    .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["totals"]["subtotal"], 20_000);
  assert_eq!(body["totals"]["shipping"], 1_200);
  assert_eq!(body["totals"]["total"], 21_200);
  assert!(body["cart"].get("sessionHandle").is_none());
  let line_id = body["items"][0]["id"].as_str().unwrap().to_owned();

  let body = json_body(
    shopper
      .send(&h, "PATCH", &format!("/cart/items/{line_id}"), Some(json!({ "quantity": 15 })))
      .await,
  )
  .await;
  assert_eq!(body["items"][0]["quantity"], 10);
  assert_eq!(body["totals"]["subtotal"], 100_000);
  assert_eq!(body["totals"]["shipping"], 0);

  let body = json_body(
    shopper
      .send(&h, "DELETE", &format!("/cart/items/{line_id}"), None)
      .await,
  )
  .await;
  assert_eq!(body["items"], json!([]));
  assert_eq!(body["totals"]["total"], 0);
}

#[tokio::test]
async fn adding_an_unknown_variant_is_not_found() {
  let h = harness().await;
  let resp = Shopper::anonymous()
    .send(&h, "POST", "/cart/items", Some(json!({ "variantId": Uuid::new_v4() })))
    .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn editing_without_a_cart_is_not_found() {
  let h = harness().await;
  let resp = Shopper::anonymous()
    .send(
      &h,
      "PATCH",
      &format!("/cart/items/{}", Uuid::new_v4()),
      Some(json!({ "quantity": 2 })),
    )
    .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

async fn anonymous_line(h: &Harness, shopper: &mut Shopper) -> String {
  let body = json_body(
    shopper
      .send(h, "POST", "/cart/items", Some(json!({ "variantId": h.variant })))
      .await,
  )
  .await;
  assert_eq!(body["cart"]["accountId"], Value::Null);
  body["items"][0]["id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn signed_in_edit_claims_the_session_cart() {
  let h = harness().await;
  let mut shopper = Shopper::anonymous();
  let line_id = anonymous_line(&h, &mut shopper).await;

  shopper.account = Some("acct-claim");
  let body = json_body(
    shopper
      .send(&h, "PATCH", &format!("/cart/items/{line_id}"), Some(json!({ "quantity": 3 })))
      .await,
  )
  .await;
  assert_eq!(body["cart"]["accountId"], "acct-claim");

  // Another device signed in to the same account finds the cart.
  let elsewhere =
    json_body(Shopper::signed_in("acct-claim").send(&h, "GET", "/cart", None).await).await;
  assert_eq!(elsewhere["cart"]["id"], body["cart"]["id"]);
  assert_eq!(elsewhere["items"][0]["quantity"], 3);
}

#[tokio::test]
async fn signed_in_removal_claims_the_session_cart() {
  let h = harness().await;
  let mut shopper = Shopper::anonymous();
  let line_id = anonymous_line(&h, &mut shopper).await;

  shopper.account = Some("acct-remover");
  let body = json_body(
    shopper
      .send(&h, "DELETE", &format!("/cart/items/{line_id}"), None)
      .await,
  )
  .await;
  assert_eq!(body["cart"]["accountId"], "acct-remover");
  assert_eq!(body["items"], json!([]));
}

// ─── Checkout ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymous_checkout_redirects_to_sign_in() {
  let h = harness().await;
  let resp = Shopper::anonymous().checkout(&h, "en").await;
  assert_eq!(resp.status(), StatusCode::SEE_OTHER);
  assert!(location(&resp).starts_with("https://shop.test/en/sign-in"));
}

#[tokio::test]
async fn inactive_account_is_sent_to_onboarding() {
  let h = harness().await;
  let resp = Shopper::signed_in("acct-new").checkout(&h, "en").await;
  assert_eq!(resp.status(), StatusCode::SEE_OTHER);
  assert_eq!(location(&resp), "https://shop.test/en/onboarding");
}

#[tokio::test]
async fn empty_cart_checkout_returns_to_cart() {
  let h = harness().await;
  activate(&h, "acct-empty").await;
  let resp = Shopper::signed_in("acct-empty").checkout(&h, "en").await;
  assert_eq!(resp.status(), StatusCode::SEE_OTHER);
  assert_eq!(location(&resp), "https://shop.test/en/cart");
  assert!(h.payments.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn checkout_opens_a_hosted_session() {
  let h = harness().await;
  activate(&h, "acct-buyer").await;
  let mut shopper = Shopper::signed_in("acct-buyer");
  shopper
    .send(&h, "POST", "/cart/items", Some(json!({ "variantId": h.variant, "quantity": 2 })))
    .await;

  let resp = shopper.checkout(&h, "fr").await;
  assert_eq!(resp.status(), StatusCode::SEE_OTHER);
  assert_eq!(location(&resp), "https://pay.test/session");

  let request = h.payments.last_request();
  assert_eq!(request.currency, "usd");
  assert_eq!(request.line_items.len(), 2, "one product line plus shipping");
  assert_eq!(request.line_items[0].unit_amount, 10_000);
  assert_eq!(request.line_items[0].quantity, 2);
  assert_eq!(request.line_items[0].description.as_deref(), Some("WB-OS-GRY · Grey"));
  assert_eq!(request.line_items[1].unit_amount, 1_200);
  assert_eq!(request.allowed_shipping_countries, vec!["US", "CA"]);
  assert_eq!(request.locale.as_deref(), Some("fr"));
  assert_eq!(
    request.success_url,
    "https://shop.test/fr/checkout?success=1&session_id={CHECKOUT_SESSION_ID}"
  );
  assert_eq!(request.cancel_url, "https://shop.test/fr/checkout?canceled=1");
  assert_eq!(request.metadata["accountId"], "acct-buyer");

  let order_id: Uuid = request.metadata["orderId"].parse().unwrap();
  let order = h.store.get_order(order_id).await.unwrap().unwrap();
  assert_eq!(order.order_number.as_str(), request.client_reference_id);
  assert_eq!(order.payment_session_id.as_deref(), Some("cs_test_1"));
  assert_eq!(order.total, 21_200);
}

#[tokio::test]
async fn repeated_checkout_reuses_the_order_number() {
  let h = harness().await;
  activate(&h, "acct-twice").await;
  let mut shopper = Shopper::signed_in("acct-twice");
  shopper
    .send(&h, "POST", "/cart/items", Some(json!({ "variantId": h.variant })))
    .await;

  shopper.checkout(&h, "en").await;
  let first = h.payments.last_request();
  shopper
    .send(&h, "POST", "/cart/items", Some(json!({ "variantId": h.variant, "quantity": 2 })))
    .await;
  shopper.checkout(&h, "en").await;
  let second = h.payments.last_request();

  assert_eq!(first.client_reference_id, second.client_reference_id);
  assert_eq!(first.metadata["orderId"], second.metadata["orderId"]);
  assert_eq!(second.line_items[0].quantity, 3);

  let cart_id: Uuid = second.metadata["cartId"].parse().unwrap();
  assert_eq!(h.store.orders_for_cart(cart_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_redirect_url_is_a_gateway_error() {
  let h = harness_with(FakeProvider::default()).await;
  activate(&h, "acct-nourl").await;
  let mut shopper = Shopper::signed_in("acct-nourl");
  shopper
    .send(&h, "POST", "/cart/items", Some(json!({ "variantId": h.variant })))
    .await;

  let resp = shopper.checkout(&h, "en").await;
  assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

  let order_id: Uuid = h.payments.last_request().metadata["orderId"].parse().unwrap();
  let order = h.store.get_order(order_id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn provider_failure_is_a_gateway_error() {
  let h = harness_with(FakeProvider { down: true, ..FakeProvider::redirecting() }).await;
  activate(&h, "acct-down").await;
  let mut shopper = Shopper::signed_in("acct-down");
  shopper
    .send(&h, "POST", "/cart/items", Some(json!({ "variantId": h.variant })))
    .await;

  let resp = shopper.checkout(&h, "en").await;
  assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
  assert_eq!(json_body(resp).await["error"], "payment provider unavailable");
}

// ─── Webhooks ─────────────────────────────────────────────────────────────────

/// Run a checkout and return the `(order_id, cart_id, session_id)` it opened.
async fn checked_out(h: &Harness, account: &'static str) -> (String, String, String) {
  activate(h, account).await;
  let mut shopper = Shopper::signed_in(account);
  shopper
    .send(h, "POST", "/cart/items", Some(json!({ "variantId": h.variant, "quantity": 2 })))
    .await;
  shopper.checkout(h, "en").await;
  let request = h.payments.last_request();
  let session_id = format!("cs_test_{}", h.payments.requests.lock().unwrap().len());
  (
    request.metadata["orderId"].clone(),
    request.metadata["cartId"].clone(),
    session_id,
  )
}

fn completed(order_id: &str, cart_id: &str, session_id: &str) -> Value {
  json!({
    "id": "evt_completed",
    "type": "checkout.session.completed",
    "data": { "object": {
      "id": session_id,
      "payment_intent": "pi_test_1",
      "metadata": { "orderId": order_id, "cartId": cart_id }
    }}
  })
}

#[tokio::test]
async fn unsigned_or_forged_webhooks_are_rejected() {
  let h = harness().await;
  let payload = completed(&Uuid::new_v4().to_string(), &Uuid::new_v4().to_string(), "cs_x");

  let resp = post_webhook(&h, &payload, None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let forged = WebhookVerifier::new("whsec_wrong", 300)
    .unwrap()
    .sign(payload.to_string().as_bytes(), chrono::Utc::now().timestamp());
  let resp = post_webhook(&h, &payload, Some(forged)).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn undecodable_payload_is_rejected() {
  let h = harness().await;
  let payload = json!({ "unexpected": true });
  let resp = post_webhook(&h, &payload, Some(sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completed_webhook_pays_order_and_empties_cart() {
  let h = harness().await;
  let (order_id, cart_id, session_id) = checked_out(&h, "acct-pay").await;
  let payload = completed(&order_id, &cart_id, &session_id);

  let resp = post_webhook(&h, &payload, Some(sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, json!({ "received": true }));

  let order = h
    .store
    .get_order(order_id.parse().unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(order.status, OrderStatus::Paid);
  assert_eq!(order.payment_status, PaymentStatus::Succeeded);
  assert_eq!(order.payment_intent_id.as_deref(), Some("pi_test_1"));

  let summary = h
    .store
    .cart_summary(None, Some(AccountId::new("acct-pay")))
    .await
    .unwrap();
  assert!(summary.is_empty());
  assert_converted_and_empty(&h, &cart_id).await;

  // Redelivery is acknowledged and changes nothing.
  let resp = post_webhook(&h, &payload, Some(sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let again = h
    .store
    .get_order(order_id.parse().unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(again.updated_at, order.updated_at);
  assert_converted_and_empty(&h, &cart_id).await;
}

async fn assert_converted_and_empty(h: &Harness, cart_id: &str) {
  let snapshot = h
    .store
    .cart_snapshot(cart_id.parse().unwrap())
    .await
    .unwrap()
    .expect("cart row kept");
  assert_eq!(snapshot.cart.unwrap().status, CartStatus::Converted);
  assert!(snapshot.items.is_empty());
}

#[tokio::test]
async fn expired_webhook_cancels_and_checkout_revives() {
  let h = harness().await;
  let (order_id, _, session_id) = checked_out(&h, "acct-lapse").await;
  let payload = json!({
    "id": "evt_expired",
    "type": "checkout.session.expired",
    "data": { "object": { "id": session_id, "metadata": { "orderId": order_id } } }
  });

  let resp = post_webhook(&h, &payload, Some(sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let order = h
    .store
    .get_order(order_id.parse().unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(order.status, OrderStatus::Cancelled);
  assert_eq!(order.payment_status, PaymentStatus::Failed);

  let number = order.order_number;
  Shopper::signed_in("acct-lapse").checkout(&h, "en").await;
  assert_eq!(h.payments.last_request().client_reference_id, number.as_str());
  let order = h
    .store
    .get_order(order_id.parse().unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn unmatched_references_are_acknowledged() {
  let h = harness().await;
  let payload = completed(&Uuid::new_v4().to_string(), &Uuid::new_v4().to_string(), "cs_gone");
  let resp = post_webhook(&h, &payload, Some(sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::OK);
}

// ── Storage outage ──

#[derive(Debug, thiserror::Error)]
#[error("database is unavailable")]
struct Outage;

impl StoreError for Outage {
  fn is_not_found(&self) -> bool { false }
}

/// A store whose every call fails.
struct DownStore;

impl CommerceStore for DownStore {
  type Error = Outage;

  async fn get_or_create_cart(
    &self,
    _: SessionHandle,
    _: Option<AccountId>,
  ) -> Result<Cart, Outage> {
    Err(Outage)
  }

  async fn resolve_cart(
    &self,
    _: Option<SessionHandle>,
    _: Option<AccountId>,
  ) -> Result<Option<Cart>, Outage> {
    Err(Outage)
  }

  async fn add_line(&self, _: Uuid, _: Uuid, _: i64) -> Result<Cart, Outage> { Err(Outage) }

  async fn update_line_quantity(&self, _: Uuid, _: Uuid, _: i64) -> Result<Cart, Outage> {
    Err(Outage)
  }

  async fn remove_line(&self, _: Uuid, _: Uuid) -> Result<Cart, Outage> { Err(Outage) }

  async fn recalculate_totals(&self, _: Uuid) -> Result<Cart, Outage> { Err(Outage) }

  async fn cart_summary(
    &self,
    _: Option<SessionHandle>,
    _: Option<AccountId>,
  ) -> Result<CartSummary, Outage> {
    Err(Outage)
  }

  async fn persist_pending_order(
    &self,
    _: PendingOrderInput,
  ) -> Result<PersistedOrder, Outage> {
    Err(Outage)
  }

  async fn attach_payment_session(&self, _: Uuid, _: String) -> Result<(), Outage> {
    Err(Outage)
  }

  async fn get_order(&self, _: Uuid) -> Result<Option<Order>, Outage> { Err(Outage) }

  async fn order_items(&self, _: Uuid) -> Result<Vec<OrderItem>, Outage> { Err(Outage) }

  async fn list_orders(&self, _: AccountId) -> Result<Vec<Order>, Outage> { Err(Outage) }

  async fn orders_for_cart(&self, _: Uuid) -> Result<Vec<Order>, Outage> { Err(Outage) }

  async fn complete_checkout(
    &self,
    _: CheckoutCompleted,
  ) -> Result<ReconcileOutcome, Outage> {
    Err(Outage)
  }

  async fn expire_checkout(&self, _: CheckoutExpired) -> Result<ReconcileOutcome, Outage> {
    Err(Outage)
  }

  async fn activate_account(&self, _: AccountId) -> Result<bool, Outage> { Err(Outage) }
}

impl ActivationGate for DownStore {
  type Error = Outage;

  async fn activation(&self, _: AccountId) -> Result<Option<ActivationState>, Outage> {
    Err(Outage)
  }
}

fn down_router() -> Router {
  router(AppState {
    store:    Arc::new(DownStore),
    payments: Arc::new(FakeProvider::redirecting()),
    webhooks: Arc::new(WebhookVerifier::new(SECRET, 300).unwrap()),
    identity: Arc::new(IdentityConfig {
      cookie_name:   "till_session".into(),
      cookie_secure: false,
      accounts:      Arc::new(TrustedHeader {
        name: HeaderName::from_static(ACCOUNT_HEADER),
      }),
    }),
    checkout: Arc::new(CheckoutConfig {
      base_url:                   "https://shop.test".into(),
      default_locale:             "en".into(),
      allowed_shipping_countries: vec!["US".into()],
    }),
  })
}

fn signed_webhook(payload: &Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri("/webhooks/payments")
    .header(header::CONTENT_TYPE, "application/json")
    .header("stripe-signature", sign(payload))
    .body(Body::from(payload.to_string()))
    .unwrap()
}

#[tokio::test]
async fn storage_fault_answers_500_so_the_provider_redelivers() {
  let app = down_router();
  let payload = completed(&Uuid::new_v4().to_string(), &Uuid::new_v4().to_string(), "cs_down");

  let resp = app.clone().oneshot(signed_webhook(&payload)).await.unwrap();
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
  let body = json_body(resp).await;
  assert!(body.get("received").is_none());
  assert!(body["error"].is_string());

  // Events that never touch the store are still acknowledged.
  let ignored = json!({ "id": "evt_i", "type": "invoice.paid", "data": { "object": {} } });
  let resp = app.oneshot(signed_webhook(&ignored)).await.unwrap();
  assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn subscription_webhook_activates_the_account() {
  let h = harness().await;
  h.store
    .upsert_account(AccountId::new("acct-sub"), ActivationState::default())
    .await
    .unwrap();

  let payload = json!({
    "id": "evt_sub",
    "type": "customer.subscription.created",
    "data": { "object": { "id": "sub_1", "metadata": { "accountId": "acct-sub" } } }
  });
  let resp = post_webhook(&h, &payload, Some(sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let state = h
    .store
    .activation(AccountId::new("acct-sub"))
    .await
  .unwrap()
  .unwrap();
  assert!(state.is_active);
}

// ─── Orders ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn orders_require_an_account() {
  let h = harness().await;
  let resp = Shopper::anonymous().send(&h, "GET", "/orders", None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn orders_are_scoped_to_their_account() {
  let h = harness().await;
  let (order_id, _, _) = checked_out(&h, "acct-owner").await;

  let list = json_body(
    Shopper::signed_in("acct-owner")
      .send(&h, "GET", "/orders", None)
      .await,
  )
  .await;
  assert_eq!(list.as_array().unwrap().len(), 1);
  assert_eq!(list[0]["id"], order_id);

  let detail = Shopper::signed_in("acct-owner")
    .send(&h, "GET", &format!("/orders/{order_id}"), None)
    .await;
  assert_eq!(detail.status(), StatusCode::OK);
  let detail = json_body(detail).await;
  assert_eq!(detail["items"][0]["sku"], "WB-OS-GRY");
  assert_eq!(detail["status"], "pending");

  let other = Shopper::signed_in("acct-other")
    .send(&h, "GET", &format!("/orders/{order_id}"), None)
    .await;
  assert_eq!(other.status(), StatusCode::NOT_FOUND);
}
