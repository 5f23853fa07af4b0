//! Webhook signature verification.
//!
//! The provider signs `"{timestamp}.{raw body}"` with HMAC-SHA256 under a
//! shared secret and sends `t=<unix>,v1=<hex>[,v1=<hex>...]` in the
//! `Stripe-Signature` header. Verification runs over the exact bytes
//! received, before any JSON decoding.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, SignatureError};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verifies signed webhook deliveries against one shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
  keyed:          HmacSha256,
  tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WebhookVerifier")
      .field("tolerance_secs", &self.tolerance_secs)
      .finish_non_exhaustive()
  }
}

impl WebhookVerifier {
  pub fn new(secret: &str, tolerance_secs: u64) -> Result<Self, Error> {
    let keyed = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
      .map_err(|_| Error::InvalidSecret)?;
    Ok(Self {
      keyed,
      tolerance_secs: i64::try_from(tolerance_secs).unwrap_or(i64::MAX),
    })
  }

  /// Verify `header` against `payload` using the current time.
  pub fn verify(&self, header: &str, payload: &[u8]) -> Result<(), SignatureError> {
    self.verify_at(header, payload, Utc::now().timestamp())
  }

  /// Verify `header` against `payload` as of the unix time `now`.
  pub fn verify_at(
    &self,
    header: &str,
    payload: &[u8],
    now: i64,
  ) -> Result<(), SignatureError> {
    let (timestamp, signatures) = parse_header(header)?;

    let age = now.saturating_sub(timestamp);
    if age.abs() > self.tolerance_secs {
      return Err(SignatureError::Stale { age });
    }

    for candidate in signatures {
      let Ok(bytes) = hex::decode(candidate) else {
        continue;
      };
      if self.mac(timestamp, payload).verify_slice(&bytes).is_ok() {
        return Ok(());
      }
    }
    Err(SignatureError::Mismatch)
  }

  /// Produce a header value for `payload`, as the provider would.
  pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
    let signature = hex::encode(self.mac(timestamp, payload).finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
  }

  fn mac(&self, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = self.keyed.clone();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
  }
}

/// Split a header into its timestamp and `v1` signatures. Unknown schemes
/// are skipped.
fn parse_header(header: &str) -> Result<(i64, Vec<&str>), SignatureError> {
  let mut timestamp = None;
  let mut signatures = Vec::new();

  for part in header.split(',') {
    let Some((key, value)) = part.trim().split_once('=') else {
      return Err(SignatureError::Malformed);
    };
    match key {
      "t" => {
        timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?);
      }
      "v1" => signatures.push(value),
      _ => {}
    }
  }

  match timestamp {
    Some(t) if !signatures.is_empty() => Ok((t, signatures)),
    _ => Err(SignatureError::Malformed),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SECRET: &str = "whsec_test_secret";
  const NOW: i64 = 1_760_000_000;
  const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

  fn verifier() -> WebhookVerifier { WebhookVerifier::new(SECRET, 300).unwrap() }

  #[test]
  fn accepts_a_valid_signature() {
    let header = verifier().sign(BODY, NOW);
    assert_eq!(verifier().verify_at(&header, BODY, NOW + 10), Ok(()));
  }

  #[test]
  fn accepts_any_matching_v1_entry() {
    let good = verifier().sign(BODY, NOW);
    let good_sig = good.split_once(",v1=").unwrap().1;
    let header = format!("t={NOW},v1={},v0=legacy,v1={good_sig}", "00".repeat(32));
    assert_eq!(verifier().verify_at(&header, BODY, NOW), Ok(()));
  }

  #[test]
  fn rejects_a_tampered_body() {
    let header = verifier().sign(BODY, NOW);
    let tampered = br#"{"id":"evt_1","type":"checkout.session.expired"}"#;
    assert_eq!(
      verifier().verify_at(&header, tampered, NOW),
      Err(SignatureError::Mismatch)
    );
  }

  #[test]
  fn rejects_the_wrong_secret() {
    let header = WebhookVerifier::new("whsec_other", 300).unwrap().sign(BODY, NOW);
    assert_eq!(
      verifier().verify_at(&header, BODY, NOW),
      Err(SignatureError::Mismatch)
    );
  }

  #[test]
  fn rejects_stale_and_future_timestamps() {
    let header = verifier().sign(BODY, NOW);
    assert_eq!(
      verifier().verify_at(&header, BODY, NOW + 301),
      Err(SignatureError::Stale { age: 301 })
    );
    assert_eq!(
      verifier().verify_at(&header, BODY, NOW - 301),
      Err(SignatureError::Stale { age: -301 })
    );
  }

  #[test]
  fn rejects_malformed_headers() {
    for header in ["", "garbage", "t=abc,v1=00", "t=1760000000", "v1=deadbeef"] {
      assert_eq!(
        verifier().verify_at(header, BODY, NOW),
        Err(SignatureError::Malformed),
        "header {header:?}"
      );
    }
  }

  #[test]
  fn non_hex_signature_is_a_mismatch() {
    let header = format!("t={NOW},v1=not-hex");
    assert_eq!(
      verifier().verify_at(&header, BODY, NOW),
      Err(SignatureError::Mismatch)
    );
  }
}
