//! Admin authentication error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during admin authentication operations.
#[derive(Debug, Error)]
pub enum AdminAuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] texos_core::EmailError),

    /// Unknown email or wrong password. Deliberately not told apart.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Admin user not found.
    #[error("admin user not found")]
    UserNotFound,

    /// Admin user already exists.
    #[error("admin user already exists")]
    UserAlreadyExists,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("password hashing failed")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AdminAuthError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::UserNotFound => StatusCode::UNAUTHORIZED,
            Self::UserAlreadyExists => StatusCode::CONFLICT,
            Self::PasswordHash | Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) | Self::InvalidCredentials => {
                "Invalid email or password".to_owned()
            }
            Self::UserNotFound => "Authentication required".to_owned(),
            Self::UserAlreadyExists => "Admin user already exists".to_owned(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::PasswordHash | Self::Repository(_) => "Internal server error".to_owned(),
        }
    }
}
