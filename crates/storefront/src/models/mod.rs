//! Storefront-only records: buyer accounts and what the session holds.
//! Commerce records live in `texos_core::models`.

pub mod session;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};
pub use user::{Customer, PasswordReset, PendingRegistration};
