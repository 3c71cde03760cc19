//! Database operations for the storefront.
//!
//! Commerce tables are reached through [`PgStore`]; this module adds the
//! buyer account tables in schema `shop`:
//!
//! - `customer` - Registered buyers
//! - `pending_registration` - OTP registrations awaiting their code
//! - `password_reset` - Reset codes and the tokens they unlock
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/core/migrations/` and run via:
//! ```bash
//! cargo run -p texos-cli -- migrate
//! ```

pub mod customers;
pub mod password_resets;
pub mod pending_registrations;

pub use texos_core::RepositoryError;
pub use texos_core::db::{PgStore, create_pool};

use texos_core::Email;

fn stored_email(raw: &str) -> Result<Email, RepositoryError> {
    Email::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}
