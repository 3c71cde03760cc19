//! Admin authentication service.
//!
//! Staff sign in with email and password. Accounts are created from the
//! CLI; there is no self-service signup.

mod error;

pub use error::AdminAuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use tracing::instrument;

use texos_core::{AdminUserId, Email};

use crate::db::{AdminUserRepository, NewAdminUser, RepositoryError};
use crate::models::{AdminRole, AdminUser};

const MIN_PASSWORD_LENGTH: usize = 12;

pub struct AdminAuthService<'a> {
    admins: AdminUserRepository<'a>,
}

impl<'a> AdminAuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            admins: AdminUserRepository::new(pool),
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown email or wrong password.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AdminUser, AdminAuthError> {
        let email = Email::parse(email).map_err(|_| AdminAuthError::InvalidCredentials)?;
        let admin = self
            .admins
            .get_by_email(&email)
            .await?
            .ok_or(AdminAuthError::InvalidCredentials)?;
        verify_password(password, &admin.password_hash)?;

        tracing::info!(admin_id = %admin.id, role = %admin.role, "Admin logged in");
        Ok(admin)
    }

    /// # Errors
    ///
    /// Returns `UserNotFound` if the account was removed after login.
    pub async fn get_admin(&self, id: AdminUserId) -> Result<AdminUser, AdminAuthError> {
        self.admins
            .get_by_id(id)
            .await?
            .ok_or(AdminAuthError::UserNotFound)
    }

    /// # Errors
    ///
    /// Returns `InvalidEmail`/`InvalidInput` for bad fields and
    /// `UserAlreadyExists` if the email is taken.
    #[instrument(skip(self, password))]
    pub async fn create_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: AdminRole,
    ) -> Result<AdminUser, AdminAuthError> {
        let email = Email::parse(email)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AdminAuthError::InvalidInput("Name is required".to_owned()));
        }
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let admin = self
            .admins
            .create(&NewAdminUser {
                email: &email,
                name,
                role,
                password_hash: &password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AdminAuthError::UserAlreadyExists,
                other => other.into(),
            })?;

        tracing::info!(admin_id = %admin.id, role = %admin.role, "Admin user created");
        Ok(admin)
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn list_admins(&self) -> Result<Vec<AdminUser>, AdminAuthError> {
        Ok(self.admins.list_all().await?)
    }
}

fn validate_password(password: &str) -> Result<(), AdminAuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AdminAuthError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AdminAuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AdminAuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), AdminAuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AdminAuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AdminAuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("staff-pass-2024!").unwrap();
        assert!(verify_password("staff-pass-2024!", &hash).is_ok());
        assert!(matches!(
            verify_password("staff-pass-2025!", &hash),
            Err(AdminAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AdminAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_admin_password_minimum() {
        assert!(validate_password("short-pass").is_err());
        assert!(validate_password("long-enough-pass").is_ok());
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            AdminAuthError::InvalidCredentials.status(),
            axum::http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AdminAuthError::UserAlreadyExists.status(),
            axum::http::StatusCode::CONFLICT
        );
        assert_eq!(
            AdminAuthError::InvalidCredentials.public_message(),
            "Invalid email or password"
        );
    }
}
