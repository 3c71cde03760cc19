//! `PostgreSQL` implementation of the store ports.
//!
//! # Schema: `shop`
//!
//! - `category`, `product`, `product_image` - Catalog
//! - `cart`, `cart_item` - One cart per customer, unique per product
//! - `orders`, `order_item`, `order_status` - Orders and the status lookup
//! - `payment_transaction` - Gateway attempts keyed by reference
//! - `user_address` - Saved addresses
//! - `setting` - Key/value pricing configuration
//!
//! # Migrations
//!
//! Migrations are stored in `crates/core/migrations/` and run via:
//! ```bash
//! cargo run -p texos-cli -- migrate
//! ```

mod addresses;
mod carts;
mod catalog;
mod orders;
mod settings;
mod transactions;

use std::fmt::Display;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::RepositoryError;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Every store trait over one connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn corrupt(what: &str, e: impl Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {what} in database: {e}"))
}

/// Map unique and foreign-key violations to `Conflict`.
fn constraint_error(e: sqlx::Error, message: impl FnOnce() -> String) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
    {
        return RepositoryError::Conflict(message());
    }
    RepositoryError::Database(e)
}
