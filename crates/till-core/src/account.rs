//! The activation gate: whether an account may transact.
//!
//! Activation is decided by an onboarding subsystem outside this workspace.
//! The pipeline only reads the answer, except for the payment provider's
//! subscription callback which marks an account active.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::AccountId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationState {
  pub is_active:               bool,
  pub has_accepted_terms:      bool,
  pub onboarding_completed_at: Option<DateTime<Utc>>,
  pub email_verified:          bool,
}

/// Answers "is this account allowed to transact".
pub trait ActivationGate: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Returns `None` when the account is unknown to the gate.
  fn activation(
    &self,
    account: AccountId,
  ) -> impl Future<Output = Result<Option<ActivationState>, Self::Error>> + Send + '_;
}
