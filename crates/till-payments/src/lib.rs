//! Payment provider integration for Till: a Stripe-compatible hosted
//! checkout client, webhook signature verification and event decoding.
//!
//! Nothing here touches storage. Decoded events are handed back as
//! [`till_core::payment::PaymentEvent`]s for the HTTP layer to reconcile.

pub mod client;
pub mod error;
pub mod event;
pub mod signature;

pub use client::{StripeClient, StripeConfig};
pub use error::{Error, Result, SignatureError};
pub use event::{ProviderEvent, decode_event};
pub use signature::{SIGNATURE_HEADER, WebhookVerifier};
