//! Texos commerce engine.
//!
//! Shared by every Texos binary:
//! - `storefront` - Buyer-facing JSON API
//! - `admin` - Back-office JSON API
//! - `cli` - Migrations and management
//!
//! # Architecture
//!
//! Domain types and the pricing function are pure. The engines in
//! [`services`] are generic over the [`store::ShopStore`] ports and the
//! [`gateway::PaymentGateway`] contract; concrete adapters sit behind
//! features:
//!
//! - `postgres` - [`db::PgStore`], the sqlx implementation of every store
//! - `paystack` - [`paystack::PaystackClient`], the gateway client
//! - `env` - Environment readers for the binaries' config (implied by both)
//!
//! # Modules
//!
//! - [`types`] - IDs, email, money helpers, status vocabularies
//! - [`models`] - Records read and written by the stores
//! - [`pricing`] - Cart totals
//! - [`store`] - Persistence ports and the in-memory store
//! - [`services`] - Cart, order, payment and address engines
//! - [`webhook`] - Webhook signature and event table

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod gateway;
pub mod models;
pub mod pricing;
pub mod services;
pub mod store;
pub mod types;
pub mod webhook;

#[cfg(feature = "postgres")]
pub mod db;

#[cfg(feature = "env")]
pub mod env;

#[cfg(feature = "paystack")]
pub mod paystack;

pub use error::{ErrorKind, RepositoryError, ShopError, ShopResult};
pub use types::*;
