//! Subcommand implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use sqlx::PgPool;
use thiserror::Error;

use texos_core::env::{self, ConfigError};

/// Errors shared by every command that talks to the database.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Neither the command's own variable nor `DATABASE_URL` is set.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Load `.env`, resolve the connection string and open a pool.
///
/// `primary_key` wins over the generic `DATABASE_URL`, matching how the
/// servers resolve theirs.
pub(crate) async fn connect(primary_key: &str) -> Result<PgPool, ConnectError> {
    dotenvy::dotenv().ok();

    let url = env::database_url(primary_key)?;

    tracing::info!("Connecting to database...");
    Ok(texos_core::db::create_pool(&url).await?)
}
