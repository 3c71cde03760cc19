//! Texos storefront library.
//!
//! The buyer-facing JSON API, split out of the binary so handlers and
//! middleware can be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
