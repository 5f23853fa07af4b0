//! Decoding verified provider events into [`PaymentEvent`]s.

use std::collections::HashMap;

use serde::Deserialize;
use till_core::{
  identity::AccountId,
  payment::{
    CheckoutCompleted, CheckoutExpired, METADATA_ACCOUNT_ID, METADATA_CART_ID,
    METADATA_ORDER_ID, PaymentEvent,
  },
};
use tracing::warn;
use uuid::Uuid;

use crate::Result;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_SESSION_EXPIRED: &str = "checkout.session.expired";
pub const SUBSCRIPTION_CREATED: &str = "customer.subscription.created";

/// A decoded event with the provider's identifiers kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
  pub id:         String,
  pub event_type: String,
  pub event:      PaymentEvent,
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawEvent {
  id:         String,
  #[serde(rename = "type")]
  event_type: String,
  data:       RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
  object: serde_json::Value,
}

/// A field the provider sends either as an id or as an expanded object.
#[derive(Deserialize)]
#[serde(untagged)]
enum Expandable {
  Id(String),
  Object { id: String },
}

impl Expandable {
  fn into_id(self) -> String {
    match self {
      Expandable::Id(id) | Expandable::Object { id } => id,
    }
  }
}

#[derive(Deserialize)]
struct RawCheckoutSession {
  id:             String,
  payment_intent: Option<Expandable>,
  #[serde(default)]
  metadata:       HashMap<String, String>,
}

#[derive(Deserialize)]
struct RawSubscription {
  #[serde(default)]
  metadata: HashMap<String, String>,
}

fn metadata_uuid(metadata: &HashMap<String, String>, key: &str) -> Option<Uuid> {
  let raw = metadata.get(key)?;
  match Uuid::parse_str(raw) {
    Ok(id) => Some(id),
    Err(_) => {
      warn!(key, value = %raw, "ignoring malformed metadata id");
      None
    }
  }
}

// ─── Decoding ────────────────────────────────────────────────────────────────

/// Decode a raw event body. Callers must verify the signature first.
pub fn decode_event(payload: &[u8]) -> Result<ProviderEvent> {
  let raw: RawEvent = serde_json::from_slice(payload)?;

  let event = match raw.event_type.as_str() {
    CHECKOUT_SESSION_COMPLETED => {
      let session: RawCheckoutSession = serde_json::from_value(raw.data.object)?;
      PaymentEvent::CheckoutCompleted(CheckoutCompleted {
        order_id:          metadata_uuid(&session.metadata, METADATA_ORDER_ID),
        cart_id:           metadata_uuid(&session.metadata, METADATA_CART_ID),
        payment_intent_id: session.payment_intent.map(Expandable::into_id),
        session_id:        session.id,
      })
    }
    CHECKOUT_SESSION_EXPIRED => {
      let session: RawCheckoutSession = serde_json::from_value(raw.data.object)?;
      PaymentEvent::CheckoutExpired(CheckoutExpired {
        order_id:   metadata_uuid(&session.metadata, METADATA_ORDER_ID),
        session_id: session.id,
      })
    }
    SUBSCRIPTION_CREATED => {
      let subscription: RawSubscription = serde_json::from_value(raw.data.object)?;
      PaymentEvent::SubscriptionCreated {
        account_id: subscription
          .metadata
          .get(METADATA_ACCOUNT_ID)
          .filter(|id| !id.is_empty())
          .map(AccountId::new),
      }
    }
    other => PaymentEvent::Ignored { event_type: other.to_owned() },
  };

  Ok(ProviderEvent { id: raw.id, event_type: raw.event_type, event })
}
