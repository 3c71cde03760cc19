//! Texos admin library.
//!
//! The back-office JSON API as a library, so handlers can be tested and
//! the CLI can reuse the staff account code.
//!
//! # Security
//!
//! This crate holds write access to order status, payment reconciliation
//! and pricing settings. Only deploy it on a private network.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
