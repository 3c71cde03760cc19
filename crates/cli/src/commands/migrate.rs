//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! texos-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! All migrations live in `crates/core/migrations/` and are embedded into
//! the binary at compile time. They create the `shop` schema, seed the
//! order statuses and pricing settings, and create the `admin` and
//! `tower_sessions` schemas.

use thiserror::Error;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply every pending migration.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect("DATABASE_URL").await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../core/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
