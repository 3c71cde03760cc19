//! Database operations for admin.
//!
//! # Schema: `admin` (kept apart from the buyer tables in `shop`)
//!
//! ## Tables
//!
//! - `admin_user` - Staff accounts with roles
//! - `session` - Admin session storage
//!
//! Orders, transactions and settings are read and written through
//! [`PgStore`], the same engine the storefront uses.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/core/migrations/` and run via:
//! ```bash
//! cargo run -p texos-cli -- migrate
//! ```

pub mod admin_users;

pub use admin_users::{AdminUserRepository, NewAdminUser};
pub use texos_core::RepositoryError;
pub use texos_core::db::{PgStore, create_pool};
