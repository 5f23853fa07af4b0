//! Handlers for `/cart` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/cart` | Empty shape when the caller has no cart |
//! | `POST`   | `/cart/items` | Body: `{"variantId": "...", "quantity": 2}` |
//! | `PATCH`  | `/cart/items/:id` | Body: `{"quantity": 3}`; foreign lines are ignored |
//! | `DELETE` | `/cart/items/:id` | Foreign lines are ignored |
//!
//! Every mutation answers with the fresh cart summary. Quantities are clamped
//! by the store; prices and totals are never read from the request.

use axum::{
  Extension, Json,
  extract::{Path, State},
};
use serde::Deserialize;
use till_core::{
  cart::{Cart, CartSummary},
  identity::Identity,
  store::CommerceStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

async fn summary_of<S: CommerceStore>(
  store: &S,
  identity: Identity,
) -> Result<Json<CartSummary>, ApiError> {
  let summary = store
    .cart_summary(Some(identity.session), identity.account)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(summary))
}

/// The caller's existing cart; mutations of lines need one.
///
/// A signed-in caller editing their session's unclaimed cart claims it, the
/// same as adding a line would.
async fn existing_cart<S: CommerceStore>(
  store: &S,
  identity: &Identity,
) -> Result<Cart, ApiError> {
  let cart = store
    .resolve_cart(Some(identity.session.clone()), identity.account.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("no cart for this session".to_owned()))?;

  let claimable = identity.account.is_some()
    && cart.account_id.is_none()
    && cart.session_handle.as_ref() == Some(&identity.session);
  if !claimable {
    return Ok(cart);
  }
  store
    .get_or_create_cart(identity.session.clone(), identity.account.clone())
    .await
    .map_err(ApiError::store)
}

// ─── Show ─────────────────────────────────────────────────────────────────────

/// `GET /cart`
pub async fn show<S: CommerceStore, P>(
  State(state): State<AppState<S, P>>,
  Extension(identity): Extension<Identity>,
) -> Result<Json<CartSummary>, ApiError> {
  summary_of(state.store.as_ref(), identity).await
}

// ─── Add ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBody {
  pub variant_id: Uuid,
  #[serde(default = "one")]
  pub quantity:   i64,
}

fn one() -> i64 { 1 }

/// `POST /cart/items`
pub async fn add<S: CommerceStore, P>(
  State(state): State<AppState<S, P>>,
  Extension(identity): Extension<Identity>,
  Json(body): Json<AddBody>,
) -> Result<Json<CartSummary>, ApiError> {
  let store = state.store.as_ref();
  let cart = store
    .get_or_create_cart(identity.session.clone(), identity.account.clone())
    .await
    .map_err(ApiError::store)?;
  store
    .add_line(cart.id, body.variant_id, body.quantity)
    .await
    .map_err(ApiError::store)?;
  summary_of(store, identity).await
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub quantity: i64,
}

/// `PATCH /cart/items/:id`
pub async fn update<S: CommerceStore, P>(
  State(state): State<AppState<S, P>>,
  Extension(identity): Extension<Identity>,
  Path(line_id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<CartSummary>, ApiError> {
  let store = state.store.as_ref();
  let cart = existing_cart(store, &identity).await?;
  store
    .update_line_quantity(cart.id, line_id, body.quantity)
    .await
    .map_err(ApiError::store)?;
  summary_of(store, identity).await
}

// ─── Remove ───────────────────────────────────────────────────────────────────

/// `DELETE /cart/items/:id`
pub async fn remove<S: CommerceStore, P>(
  State(state): State<AppState<S, P>>,
  Extension(identity): Extension<Identity>,
  Path(line_id): Path<Uuid>,
) -> Result<Json<CartSummary>, ApiError> {
  let store = state.store.as_ref();
  let cart = existing_cart(store, &identity).await?;
  store
    .remove_line(cart.id, line_id)
    .await
    .map_err(ApiError::store)?;
  summary_of(store, identity).await
}
