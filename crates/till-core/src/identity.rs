//! Who is shopping: an anonymous session handle, an authenticated account, or
//! both.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Opaque account identifier issued by the external auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for AccountId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Opaque, cookie-carried token identifying an anonymous shopper.
///
/// The value is a random token, never a serialized identifier. Only
/// URL-safe base64 characters are accepted so that a tampered cookie is
/// replaced rather than stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
  pub const MIN_LEN: usize = 16;
  pub const MAX_LEN: usize = 128;

  /// Mint a fresh handle from 32 bytes of OS randomness.
  pub fn generate() -> Self {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Self(URL_SAFE_NO_PAD.encode(bytes))
  }

  pub fn parse(raw: &str) -> Result<Self> {
    let valid_len = (Self::MIN_LEN..=Self::MAX_LEN).contains(&raw.len());
    let valid_chars = raw
      .bytes()
      .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid_len && valid_chars {
      Ok(Self(raw.to_owned()))
    } else {
      Err(Error::InvalidSessionHandle)
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SessionHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// The resolved caller of a request.
#[derive(Debug, Clone)]
pub struct Identity {
  pub session: SessionHandle,
  pub account: Option<AccountId>,
}
