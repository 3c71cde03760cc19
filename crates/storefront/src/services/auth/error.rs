//! Authentication error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::email::EmailError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] texos_core::EmailError),

    /// Missing or malformed registration field.
    #[error("{0}")]
    InvalidInput(String),

    /// Wrong password or unknown account; never says which.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("email already registered")]
    EmailTaken,

    #[error("phone number already registered")]
    PhoneTaken,

    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// A live code was already sent for this email.
    #[error("registration already pending")]
    RegistrationPending,

    #[error("no pending registration")]
    NoPendingRegistration,

    #[error("OTP expired")]
    OtpExpired,

    #[error("invalid OTP")]
    InvalidOtp,

    /// Current password given to a password change did not match.
    #[error("current password is incorrect")]
    IncorrectPassword,

    #[error("no password reset requested")]
    NoResetRequest,

    #[error("reset code expired")]
    ResetCodeExpired,

    #[error("invalid reset code")]
    InvalidResetCode,

    /// Reset token unknown, already used or past its deadline.
    #[error("invalid reset token")]
    InvalidResetToken,

    #[error("could not send verification email: {0}")]
    Mail(#[from] EmailError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail(_)
            | Self::InvalidInput(_)
            | Self::WeakPassword(_)
            | Self::NoPendingRegistration
            | Self::OtpExpired
            | Self::InvalidOtp
            | Self::IncorrectPassword
            | Self::NoResetRequest
            | Self::ResetCodeExpired
            | Self::InvalidResetCode
            | Self::InvalidResetToken => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::UserNotFound => StatusCode::UNAUTHORIZED,
            Self::EmailTaken | Self::PhoneTaken | Self::RegistrationPending => StatusCode::CONFLICT,
            Self::Mail(_) => StatusCode::BAD_GATEWAY,
            Self::Repository(_) | Self::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Please enter a valid email address".to_owned(),
            Self::InvalidInput(msg) | Self::WeakPassword(msg) => msg.clone(),
            Self::InvalidCredentials | Self::UserNotFound => "Invalid email or password".to_owned(),
            Self::EmailTaken => "Email already registered".to_owned(),
            Self::PhoneTaken => "Phone number already registered".to_owned(),
            Self::RegistrationPending => "OTP already sent. Please check your email".to_owned(),
            Self::NoPendingRegistration => "No OTP request found".to_owned(),
            Self::OtpExpired => "OTP expired".to_owned(),
            Self::InvalidOtp => "Invalid OTP".to_owned(),
            Self::IncorrectPassword => "Current password is incorrect".to_owned(),
            Self::NoResetRequest => "No reset request found".to_owned(),
            Self::ResetCodeExpired => "Verification code expired".to_owned(),
            Self::InvalidResetCode => "Invalid verification code".to_owned(),
            Self::InvalidResetToken => "Invalid reset request".to_owned(),
            Self::Mail(_) => "Could not send verification email".to_owned(),
            Self::Repository(_) | Self::PasswordHash => "Internal server error".to_owned(),
        }
    }
}
