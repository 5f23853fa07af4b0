//! Wiring for the Till storefront server: configuration and the pieces the
//! binary assembles into an [`AppState`].

use std::{path::PathBuf, sync::Arc};

use axum::http::HeaderName;
use serde::Deserialize;
use till_api::{AppState, CheckoutConfig, IdentityConfig, TrustedHeader};
use till_core::pricing::Pricing;
use till_payments::{StripeClient, StripeConfig, WebhookVerifier};
use till_store_sqlite::SqliteStore;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TILL_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host:                       String,
  #[serde(default = "defaults::port")]
  pub port:                       u16,
  /// Public storefront origin used for every redirect.
  pub base_url:                   String,
  #[serde(default = "defaults::store_path")]
  pub store_path:                 PathBuf,

  #[serde(default = "defaults::currency")]
  pub currency:                   String,
  #[serde(default = "defaults::free_shipping_threshold")]
  pub free_shipping_threshold:    i64,
  #[serde(default = "defaults::flat_shipping_fee")]
  pub flat_shipping_fee:          i64,
  #[serde(default = "defaults::allowed_shipping_countries")]
  pub allowed_shipping_countries: Vec<String>,
  #[serde(default = "defaults::default_locale")]
  pub default_locale:             String,

  #[serde(default = "defaults::cookie_name")]
  pub cookie_name:                String,
  #[serde(default)]
  pub cookie_secure:              bool,
  /// Header the upstream auth proxy sets with the account id.
  #[serde(default = "defaults::account_header")]
  pub account_header:             String,

  pub stripe_secret_key:          String,
  #[serde(default = "defaults::stripe_api_base")]
  pub stripe_api_base:            String,
  pub webhook_secret:             String,
  #[serde(default = "defaults::webhook_tolerance_secs")]
  pub webhook_tolerance_secs:     u64,
}

mod defaults {
  use std::path::PathBuf;

  use till_core::pricing::Pricing;

  pub fn host() -> String { "127.0.0.1".to_owned() }
  pub fn port() -> u16 { 8080 }
  pub fn store_path() -> PathBuf { PathBuf::from("~/.local/share/till/till.db") }
  pub fn currency() -> String { Pricing::default().currency }
  pub fn free_shipping_threshold() -> i64 { Pricing::default().free_shipping_threshold }
  pub fn flat_shipping_fee() -> i64 { Pricing::default().flat_shipping_fee }
  pub fn allowed_shipping_countries() -> Vec<String> { vec!["US".to_owned(), "CA".to_owned()] }
  pub fn default_locale() -> String { "en".to_owned() }
  pub fn cookie_name() -> String { "till_session".to_owned() }
  pub fn account_header() -> String { "x-account-id".to_owned() }
  pub fn stripe_api_base() -> String { "https://api.stripe.com".to_owned() }
  pub fn webhook_tolerance_secs() -> u64 { 300 }
}

impl ServerConfig {
  pub fn pricing(&self) -> Pricing {
    Pricing {
      currency:                self.currency.to_lowercase(),
      free_shipping_threshold: self.free_shipping_threshold,
      flat_shipping_fee:       self.flat_shipping_fee,
    }
  }

  pub fn identity(&self) -> anyhow::Result<IdentityConfig> {
    let name = HeaderName::try_from(self.account_header.as_str())
      .map_err(|e| anyhow::anyhow!("invalid account_header {:?}: {e}", self.account_header))?;
    Ok(IdentityConfig {
      cookie_name:   self.cookie_name.clone(),
      cookie_secure: self.cookie_secure,
      accounts:      Arc::new(TrustedHeader { name }),
    })
  }

  pub fn checkout(&self) -> CheckoutConfig {
    CheckoutConfig {
      base_url:                   self.base_url.trim_end_matches('/').to_owned(),
      default_locale:             self.default_locale.clone(),
      allowed_shipping_countries: self.allowed_shipping_countries.clone(),
    }
  }

  pub fn stripe(&self) -> StripeConfig {
    StripeConfig {
      secret_key: self.stripe_secret_key.clone(),
      api_base:   self.stripe_api_base.clone(),
    }
  }
}

/// Assemble the handler state from an opened store and the configuration.
pub fn build_state(
  store: SqliteStore,
  config: &ServerConfig,
) -> anyhow::Result<AppState<SqliteStore, StripeClient>> {
  let payments = StripeClient::new(config.stripe())?;
  let webhooks =
    WebhookVerifier::new(&config.webhook_secret, config.webhook_tolerance_secs)?;

  Ok(AppState {
    store:    Arc::new(store),
    payments: Arc::new(payments),
    webhooks: Arc::new(webhooks),
    identity: Arc::new(config.identity()?),
    checkout: Arc::new(config.checkout()),
  })
}
