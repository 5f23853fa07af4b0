//! Core types and trait definitions for the Till storefront pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the cart, order and payment-event vocabulary plus the pure pricing rules;
//! storage backends and the HTTP layer depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod identity;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod status;
pub mod store;

pub use error::{Error, Result};
