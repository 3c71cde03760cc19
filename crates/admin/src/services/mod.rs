//! Business logic services for admin.

pub mod auth;

pub use auth::{AdminAuthError, AdminAuthService};
