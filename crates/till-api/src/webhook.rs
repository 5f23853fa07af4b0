//! Payment webhook endpoint and reconciler.
//!
//! The provider delivers at least once and in any order. Verification runs
//! over the raw body before anything is decoded; after that each event is
//! applied in its own store transaction. Only storage faults answer with an
//! error status, which makes the provider redeliver.

use axum::{
  Json,
  extract::State,
  http::HeaderMap,
};
use bytes::Bytes;
use serde_json::{Value, json};
use till_core::{
  payment::{PaymentEvent, ReconcileOutcome},
  store::CommerceStore,
};
use till_payments::{SIGNATURE_HEADER, decode_event};
use tracing::{debug, info, warn};

use crate::{AppState, error::ApiError};

/// Apply one verified event to local state.
pub async fn reconcile<S: CommerceStore>(
  store: &S,
  event: PaymentEvent,
) -> Result<ReconcileOutcome, S::Error> {
  match event {
    PaymentEvent::CheckoutCompleted(done) => {
      let session_id = done.session_id.clone();
      let outcome = store.complete_checkout(done).await?;
      match outcome {
        ReconcileOutcome::NotFound => {
          warn!(%session_id, "completed session references no known order");
        }
        _ => info!(%session_id, ?outcome, "checkout completed"),
      }
      Ok(outcome)
    }

    PaymentEvent::CheckoutExpired(expired) => {
      let session_id = expired.session_id.clone();
      let outcome = store.expire_checkout(expired).await?;
      match outcome {
        ReconcileOutcome::NotFound => {
          warn!(%session_id, "expired session references no known order");
        }
        _ => info!(%session_id, ?outcome, "checkout expired"),
      }
      Ok(outcome)
    }

    PaymentEvent::SubscriptionCreated { account_id: Some(account) } => {
      if store.activate_account(account.clone()).await? {
        info!(account_id = %account, "account activated");
        Ok(ReconcileOutcome::Applied)
      } else {
        warn!(account_id = %account, "subscription for unknown account");
        Ok(ReconcileOutcome::NotFound)
      }
    }

    PaymentEvent::SubscriptionCreated { account_id: None } => {
      warn!("subscription event carries no account id");
      Ok(ReconcileOutcome::NotFound)
    }

    PaymentEvent::Ignored { event_type } => {
      debug!(%event_type, "ignoring event");
      Ok(ReconcileOutcome::Ignored)
    }
  }
}

/// `POST /webhooks/payments`
pub async fn receive<S: CommerceStore, P>(
  State(state): State<AppState<S, P>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<Value>, ApiError> {
  let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok())
  else {
    warn!("webhook without signature header");
    return Err(ApiError::BadRequest("missing signature".to_owned()));
  };

  if let Err(e) = state.webhooks.verify(signature, &body) {
    warn!(error = %e, "rejected webhook signature");
    return Err(ApiError::BadRequest("invalid signature".to_owned()));
  }

  let event = decode_event(&body).map_err(|e| {
    warn!(error = %e, "undecodable webhook payload");
    ApiError::BadRequest("invalid payload".to_owned())
  })?;
  debug!(event_id = %event.id, event_type = %event.event_type, "verified webhook");

  reconcile(state.store.as_ref(), event.event)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok(Json(json!({ "received": true })))
}
