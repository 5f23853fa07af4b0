//! Identity resolution: who is making this request.
//!
//! Every shopper request carries an opaque session handle in a cookie; one is
//! minted on first contact. The account id, when present, comes from an
//! upstream auth layer through an [`AccountResolver`].

use std::sync::Arc;

use axum::{
  extract::{Request, State},
  http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{COOKIE, SET_COOKIE},
  },
  middleware::Next,
  response::Response,
};
use till_core::identity::{AccountId, Identity, SessionHandle};
use tracing::{debug, warn};

/// Thirty days.
pub const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

/// Resolves the authenticated account for a request, if any.
pub trait AccountResolver: Send + Sync {
  fn resolve(&self, headers: &HeaderMap) -> Option<AccountId>;
}

/// Trusts a header set by the upstream auth proxy, e.g. `x-account-id`.
#[derive(Debug, Clone)]
pub struct TrustedHeader {
  pub name: HeaderName,
}

impl AccountResolver for TrustedHeader {
  fn resolve(&self, headers: &HeaderMap) -> Option<AccountId> {
    let value = headers.get(&self.name)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| AccountId::new(value))
  }
}

/// How the identity middleware reads and writes the session cookie.
#[derive(Clone)]
pub struct IdentityConfig {
  pub cookie_name:   String,
  /// Adds `Secure` to the cookie. Enable whenever served over TLS.
  pub cookie_secure: bool,
  pub accounts:      Arc<dyn AccountResolver>,
}

impl IdentityConfig {
  fn read_handle(&self, headers: &HeaderMap) -> Option<SessionHandle> {
    headers
      .get_all(COOKIE)
      .iter()
      .filter_map(|v| v.to_str().ok())
      .flat_map(|v| v.split(';'))
      .filter_map(|pair| pair.trim().split_once('='))
      .find(|(name, _)| *name == self.cookie_name)
      .and_then(|(_, value)| SessionHandle::parse(value).ok())
  }

  fn set_cookie(&self, handle: &SessionHandle) -> Option<HeaderValue> {
    let secure = if self.cookie_secure { "; Secure" } else { "" };
    let cookie = format!(
      "{}={}; Path=/; Max-Age={SESSION_MAX_AGE_SECS}; HttpOnly; SameSite=Lax{secure}",
      self.cookie_name, handle
    );
    HeaderValue::from_str(&cookie).ok()
  }
}

/// Middleware: attach an [`Identity`] to the request extensions, minting a
/// session handle (and its cookie) when the request has none.
pub async fn resolve(
  State(config): State<Arc<IdentityConfig>>,
  mut request: Request,
  next: Next,
) -> Response {
  let existing = config.read_handle(request.headers());
  let minted = existing.is_none();
  let session = existing.unwrap_or_else(SessionHandle::generate);
  let account = config.accounts.resolve(request.headers());

  if minted {
    debug!("minted session handle");
  }

  request.extensions_mut().insert(Identity {
    session: session.clone(),
    account,
  });
  let mut response = next.run(request).await;

  if minted {
    match config.set_cookie(&session) {
      Some(value) => {
        response.headers_mut().append(SET_COOKIE, value);
      }
      None => warn!(cookie = %config.cookie_name, "session cookie is not a valid header"),
    }
  }
  response
}
