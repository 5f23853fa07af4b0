//! The external payment provider: hosted checkout sessions going out,
//! signed events coming back.

use std::{collections::BTreeMap, future::Future};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::AccountId;

/// Metadata keys attached to every hosted session so webhook events can be
/// traced back to local rows.
pub const METADATA_ORDER_ID: &str = "orderId";
pub const METADATA_CART_ID: &str = "cartId";
pub const METADATA_ACCOUNT_ID: &str = "accountId";

// ─── Outbound ─────────────────────────────────────────────────────────────────

/// A single line shown on the provider-hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedLineItem {
  pub name:        String,
  pub description: Option<String>,
  /// Minor currency units.
  pub unit_amount: i64,
  pub quantity:    i64,
}

/// A one-time-payment hosted checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedSessionRequest {
  pub currency:                   String,
  pub line_items:                 Vec<HostedLineItem>,
  /// The local order number.
  pub client_reference_id:        String,
  pub metadata:                   BTreeMap<String, String>,
  pub allowed_shipping_countries: Vec<String>,
  pub success_url:                String,
  pub cancel_url:                 String,
  pub locale:                     Option<String>,
}

/// The provider's answer to a hosted checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedSession {
  pub id:  String,
  /// Where to send the browser. Checkout cannot proceed without it.
  pub url: Option<String>,
}

/// Opens hosted payment sessions with an external provider.
pub trait PaymentProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn create_hosted_session(
    &self,
    request: HostedSessionRequest,
  ) -> impl Future<Output = Result<HostedSession, Self::Error>> + Send + '_;
}

// ─── Inbound ──────────────────────────────────────────────────────────────────

/// A hosted session was paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCompleted {
  pub session_id:        String,
  pub payment_intent_id: Option<String>,
  pub order_id:          Option<Uuid>,
  /// Absent for sessions that were not opened from a tracked cart; the cart
  /// is then left as is.
  pub cart_id:           Option<Uuid>,
}

/// A hosted session lapsed without payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutExpired {
  pub session_id: String,
  pub order_id:   Option<Uuid>,
}

/// A verified provider event, reduced to what the pipeline acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
  CheckoutCompleted(CheckoutCompleted),
  CheckoutExpired(CheckoutExpired),
  SubscriptionCreated { account_id: Option<AccountId> },
  /// Any other event type; acknowledged and dropped.
  Ignored { event_type: String },
}

/// What applying an event did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
  Applied,
  /// The target was already in the resulting state; nothing changed.
  AlreadyApplied,
  /// No local row matched the event's references.
  NotFound,
  /// The event type is not acted on.
  Ignored,
}
