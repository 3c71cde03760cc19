//! Storefront services.
//!
//! Commerce engines come from `texos_core::services`; these cover what only
//! the buyer-facing binary does.
//!
//! - `auth` - Password login and OTP registration
//! - `email` - SMTP delivery of registration codes

pub mod auth;
pub mod email;
