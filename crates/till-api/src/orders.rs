//! Handlers for `/orders` endpoints. Both require a signed-in account and
//! only ever show that account's orders.

use axum::{
  Extension, Json,
  extract::{Path, State},
};
use serde::Serialize;
use till_core::{
  identity::{AccountId, Identity},
  order::{Order, OrderItem},
  store::CommerceStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

fn require_account(identity: Identity) -> Result<AccountId, ApiError> {
  identity.account.ok_or(ApiError::Unauthorized)
}

/// `GET /orders`
pub async fn list<S: CommerceStore, P>(
  State(state): State<AppState<S, P>>,
  Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Order>>, ApiError> {
  let account = require_account(identity)?;
  let orders = state
    .store
    .list_orders(account)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(orders))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
  #[serde(flatten)]
  pub order: Order,
  pub items: Vec<OrderItem>,
}

/// `GET /orders/:id`
pub async fn get_one<S: CommerceStore, P>(
  State(state): State<AppState<S, P>>,
  Extension(identity): Extension<Identity>,
  Path(id): Path<Uuid>,
) -> Result<Json<OrderDetail>, ApiError> {
  let account = require_account(identity)?;
  let not_found = || ApiError::NotFound(format!("order {id} not found"));

  let order = state
    .store
    .get_order(id)
    .await
    .map_err(ApiError::store)?
    .filter(|order| order.account_id == account)
    .ok_or_else(not_found)?;
  let items = state.store.order_items(id).await.map_err(ApiError::store)?;

  Ok(Json(OrderDetail { order, items }))
}
