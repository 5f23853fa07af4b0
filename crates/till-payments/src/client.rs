//! Async HTTP client for the provider's hosted checkout API.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use till_core::payment::{
  HostedSession, HostedSessionRequest, PaymentProvider,
};
use tracing::{debug, error};

use crate::{Error, Result};

/// Connection settings for the payment provider.
#[derive(Clone)]
pub struct StripeConfig {
  pub secret_key: String,
  /// e.g. `https://api.stripe.com`
  pub api_base:   String,
}

/// Hosted checkout client.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct StripeClient {
  client: Client,
  config: StripeConfig,
}

#[derive(Deserialize)]
struct RawSession {
  id:  String,
  url: Option<String>,
}

#[derive(Deserialize)]
struct RawErrorBody {
  error: RawErrorDetail,
}

#[derive(Deserialize)]
struct RawErrorDetail {
  message: Option<String>,
}

impl StripeClient {
  pub fn new(config: StripeConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/v1{}", self.config.api_base.trim_end_matches('/'), path)
  }
}

/// Flatten a hosted session request into the provider's bracketed form
/// encoding.
pub fn session_form(request: &HostedSessionRequest) -> Vec<(String, String)> {
  let mut form = vec![
    ("mode".to_owned(), "payment".to_owned()),
    ("client_reference_id".to_owned(), request.client_reference_id.clone()),
    ("success_url".to_owned(), request.success_url.clone()),
    ("cancel_url".to_owned(), request.cancel_url.clone()),
  ];

  if let Some(locale) = &request.locale {
    form.push(("locale".to_owned(), locale.clone()));
  }

  for (i, item) in request.line_items.iter().enumerate() {
    let prefix = format!("line_items[{i}]");
    form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    form.push((format!("{prefix}[price_data][currency]"), request.currency.clone()));
    form.push((
      format!("{prefix}[price_data][unit_amount]"),
      item.unit_amount.to_string(),
    ));
    form.push((format!("{prefix}[price_data][product_data][name]"), item.name.clone()));
    if let Some(description) = &item.description {
      form.push((
        format!("{prefix}[price_data][product_data][description]"),
        description.clone(),
      ));
    }
  }

  for (key, value) in &request.metadata {
    form.push((format!("metadata[{key}]"), value.clone()));
    form.push((format!("payment_intent_data[metadata][{key}]"), value.clone()));
  }

  for (i, country) in request.allowed_shipping_countries.iter().enumerate() {
    form.push((
      format!("shipping_address_collection[allowed_countries][{i}]"),
      country.clone(),
    ));
  }

  form
}

impl PaymentProvider for StripeClient {
  type Error = Error;

  /// `POST /v1/checkout/sessions`
  async fn create_hosted_session(
    &self,
    request: HostedSessionRequest,
  ) -> Result<HostedSession> {
    let resp = self
      .client
      .post(self.url("/checkout/sessions"))
      .bearer_auth(&self.config.secret_key)
      .form(&session_form(&request))
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      let message = serde_json::from_str::<RawErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or(body);
      error!(
        status = status.as_u16(),
        reference = %request.client_reference_id,
        %message,
        "hosted session request rejected"
      );
      return Err(Error::Provider { status: status.as_u16(), message });
    }

    let session: RawSession = resp.json().await?;
    debug!(session_id = %session.id, "opened hosted session");
    Ok(HostedSession { id: session.id, url: session.url })
  }
}
