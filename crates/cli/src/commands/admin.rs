//! Admin user management commands.
//!
//! Staff accounts are only ever created here; the admin API has no signup.
//!
//! # Usage
//!
//! ```bash
//! texos-cli admin create -e admin@example.com -n "Admin Name" -p 'long-passphrase' -r super_admin
//! texos-cli admin list
//! ```
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use thiserror::Error;

use texos_admin::models::AdminRole;
use texos_admin::services::{AdminAuthError, AdminAuthService};

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin, viewer")]
    InvalidRole(String),

    #[error(transparent)]
    Auth(#[from] AdminAuthError),
}

/// Create a new admin user and return its ID.
///
/// # Errors
///
/// Returns an error for an unknown role, an invalid email, a short password
/// or an email that already has an account.
pub async fn create_user(
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> Result<i32, AdminError> {
    let role: AdminRole = role
        .parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))?;

    let pool = connect("ADMIN_DATABASE_URL").await?;

    tracing::info!("Creating admin user: {} ({})", email, role);
    let admin = AdminAuthService::new(&pool)
        .create_admin(email, name, password, role)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Role: {}",
        admin.id,
        admin.email,
        admin.role
    );

    Ok(admin.id.as_i32())
}

/// Log every admin account.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn list_users() -> Result<(), AdminError> {
    let pool = connect("ADMIN_DATABASE_URL").await?;
    let admins = AdminAuthService::new(&pool).list_admins().await?;

    if admins.is_empty() {
        tracing::info!("No admin users. Create one with `texos-cli admin create`.");
        return Ok(());
    }

    for admin in admins {
        tracing::info!(
            "  {:>4}  {:<12} {} <{}>",
            admin.id.as_i32(),
            admin.role.as_str(),
            admin.name,
            admin.email
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_role_is_rejected_before_connecting() {
        let result =
            create_user("ops@example.com", "Ops", "a-long-enough-passphrase", "owner").await;
        assert!(matches!(result, Err(AdminError::InvalidRole(role)) if role == "owner"));
    }
}
