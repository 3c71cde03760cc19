//! Buyer authentication: password login, OTP registration, password reset
//! and account updates.
//!
//! Registration is two steps. [`AuthService::request_registration`] stores
//! a pending row holding the argon2 password hash and the SHA-256 of a
//! 6-digit code, then mails the code. [`AuthService::verify_registration`]
//! checks the code and turns the row into a customer in one transaction.
//!
//! Password reset is three: a mailed code, a code check that hands out a
//! single-use reset token, and the reset itself, which consumes the token
//! and writes the new hash in one transaction.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::instrument;

use texos_core::{Email, RepositoryError, UserId};

use crate::db::customers::CustomerRepository;
use crate::db::password_resets::PasswordResetRepository;
use crate::db::pending_registrations::PendingRegistrationRepository;
use crate::models::{Customer, PasswordReset, PendingRegistration};
use crate::services::email::EmailService;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_USERNAME_LENGTH: usize = 50;
/// Registration and reset codes are valid this long.
pub const OTP_VALID_MINUTES: i64 = 10;
/// A confirmed reset code leaves this long to choose the new password.
pub const RESET_TOKEN_VALID_MINUTES: i64 = 15;

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub username: String,
    pub email: String,
    #[serde(alias = "phonenumber")]
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Profile fields to change. Absent and blank fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "phonenumber")]
    pub phone: Option<String>,
}

/// A [`ProfileUpdate`] that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProfileChanges {
    username: Option<String>,
    email: Option<Email>,
    phone: Option<String>,
}

impl ProfileUpdate {
    fn validate(&self) -> Result<ProfileChanges, AuthError> {
        let given = |field: &Option<String>| {
            field
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        let username = given(&self.username);
        let email = given(&self.email);
        let phone = given(&self.phone);
        if username.is_none() && email.is_none() && phone.is_none() {
            return Err(AuthError::InvalidInput(
                "Please provide at least one field to update".to_owned(),
            ));
        }

        Ok(ProfileChanges {
            username: username.as_deref().map(validate_username).transpose()?,
            email: email.as_deref().map(Email::parse).transpose()?,
            phone: phone.as_deref().map(validate_phone).transpose()?,
        })
    }
}

pub struct AuthService<'a> {
    customers: CustomerRepository<'a>,
    pending: PendingRegistrationRepository<'a>,
    resets: PasswordResetRepository<'a>,
    mailer: Option<&'a EmailService>,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, mailer: Option<&'a EmailService>) -> Self {
        Self {
            customers: CustomerRepository::new(pool),
            pending: PendingRegistrationRepository::new(pool),
            resets: PasswordResetRepository::new(pool),
            mailer,
        }
    }

    /// Validate a registration and email its code.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput`/`InvalidEmail`/`WeakPassword` for bad fields,
    /// `EmailTaken`/`PhoneTaken` for existing accounts,
    /// `RegistrationPending` while a previous code is live and `Mail` if the
    /// code could not be sent (the pending row is removed again).
    #[instrument(skip(self, request), fields(email = %request.email.trim()))]
    pub async fn request_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<Email, AuthError> {
        let username = validate_username(&request.username)?;
        let email = Email::parse(&request.email)?;
        let phone = validate_phone(&request.phone)?;
        validate_password(&request.password)?;

        if self.customers.email_exists(&email).await? {
            return Err(AuthError::EmailTaken);
        }
        if self.customers.phone_exists(&phone).await? {
            return Err(AuthError::PhoneTaken);
        }

        let code = generate_verification_code();
        let pending = PendingRegistration {
            email: email.clone(),
            username,
            phone,
            password_hash: hash_password(&request.password)?,
            code_hash: hash_code(&code),
            expires_at: Utc::now() + Duration::minutes(OTP_VALID_MINUTES),
            created_at: Utc::now(),
        };

        self.pending.insert(&pending).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::RegistrationPending,
            other => AuthError::Repository(other),
        })?;

        match self.mailer {
            Some(mailer) => {
                if let Err(e) = mailer
                    .send_registration_code(
                        email.as_str(),
                        &pending.username,
                        &code,
                        OTP_VALID_MINUTES,
                    )
                    .await
                {
                    tracing::error!(error = %e, "Failed to send registration code");
                    self.pending.delete(&email).await?;
                    return Err(AuthError::Mail(e));
                }
            }
            None => {
                tracing::warn!("SMTP not configured; registration code not emailed");
                tracing::debug!(code = %code, "Registration code");
            }
        }

        tracing::info!("Registration code issued");
        Ok(email)
    }

    /// Confirm a registration code and create the account.
    ///
    /// # Errors
    ///
    /// Returns `NoPendingRegistration` if nothing is waiting for the email,
    /// `OtpExpired` (the stale row is removed), `InvalidOtp` for a wrong code
    /// and `EmailTaken` if the email was registered meanwhile.
    #[instrument(skip(self, code))]
    pub async fn verify_registration(&self, email: &str, code: &str) -> Result<Customer, AuthError> {
        let email = Email::parse(email)?;
        let pending = self
            .pending
            .get(&email)
            .await?
            .ok_or(AuthError::NoPendingRegistration)?;

        if pending.is_expired(Utc::now()) {
            self.pending.delete(&email).await?;
            return Err(AuthError::OtpExpired);
        }
        let code_hash = hash_code(code.trim());
        if code_hash != pending.code_hash {
            return Err(AuthError::InvalidOtp);
        }

        let customer = self
            .pending
            .complete(&email, &code_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Repository(other),
            })?
            .ok_or(AuthError::NoPendingRegistration)?;

        tracing::info!(user_id = %customer.id, "Customer registered");
        Ok(customer)
    }

    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for a malformed email, an
    /// unknown account or a wrong password alike.
    #[instrument(skip(self, email, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Customer, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let customer = self
            .customers
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &customer.password_hash)?;

        tracing::info!(user_id = %customer.id, "Customer logged in");
        Ok(customer)
    }

    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn get_customer(&self, id: UserId) -> Result<Customer, AuthError> {
        self.customers
            .get_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Email a reset code if `email` belongs to an account.
    ///
    /// Unknown emails and emails with a live code succeed silently, so the
    /// caller answers every request the same way.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail` for a malformed address and `Mail` if the code
    /// could not be sent (the reset row is removed again).
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let Some(customer) = self.customers.get_by_email(&email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };

        let code = generate_verification_code();
        let reset = PasswordReset {
            email: email.clone(),
            code_hash: hash_code(&code),
            token_hash: None,
            expires_at: Utc::now() + Duration::minutes(OTP_VALID_MINUTES),
            created_at: Utc::now(),
        };
        match self.resets.insert(&reset).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => {
                tracing::info!(user_id = %customer.id, "Password reset already pending");
                return Ok(());
            }
            Err(other) => return Err(other.into()),
        }

        match self.mailer {
            Some(mailer) => {
                if let Err(e) = mailer
                    .send_password_reset_code(
                        email.as_str(),
                        &customer.username,
                        &code,
                        OTP_VALID_MINUTES,
                    )
                    .await
                {
                    tracing::error!(error = %e, "Failed to send password reset code");
                    self.resets.delete(&email).await?;
                    return Err(AuthError::Mail(e));
                }
            }
            None => {
                tracing::warn!("SMTP not configured; reset code not emailed");
                tracing::debug!(code = %code, "Password reset code");
            }
        }

        tracing::info!(user_id = %customer.id, "Password reset code issued");
        Ok(())
    }

    /// Check a reset code and hand out the token that authorises the reset.
    ///
    /// # Errors
    ///
    /// Returns `NoResetRequest` if nothing is waiting for the email,
    /// `ResetCodeExpired` (the stale row is removed) and `InvalidResetCode`
    /// for a wrong code.
    #[instrument(skip(self, code))]
    pub async fn verify_reset_code(&self, email: &str, code: &str) -> Result<String, AuthError> {
        let email = Email::parse(email)?;
        let reset = self
            .resets
            .get(&email)
            .await?
            .ok_or(AuthError::NoResetRequest)?;

        if reset.is_expired(Utc::now()) {
            self.resets.delete(&email).await?;
            return Err(AuthError::ResetCodeExpired);
        }
        let code_hash = hash_code(code.trim());
        if code_hash != reset.code_hash {
            return Err(AuthError::InvalidResetCode);
        }

        let token = generate_reset_token();
        let issued = self
            .resets
            .issue_token(
                &email,
                &code_hash,
                &hash_code(&token),
                Utc::now() + Duration::minutes(RESET_TOKEN_VALID_MINUTES),
            )
            .await?;
        if !issued {
            return Err(AuthError::ResetCodeExpired);
        }

        tracing::info!("Password reset code confirmed");
        Ok(token)
    }

    /// Set a new password with a token from [`Self::verify_reset_code`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput`/`WeakPassword` for a bad new password and
    /// `InvalidResetToken` when the token is unknown, used or expired.
    #[instrument(skip(self, request), fields(email = %request.email.trim()))]
    pub async fn reset_password(&self, request: &PasswordResetRequest) -> Result<(), AuthError> {
        validate_new_password(
            &request.new_password,
            &request.confirm_password,
            "Passwords do not match",
        )?;
        let email = Email::parse(&request.email)?;
        let password_hash = hash_password(&request.new_password)?;

        let done = self
            .resets
            .complete(&email, &hash_code(request.token.trim()), &password_hash)
            .await?;
        if !done {
            return Err(AuthError::InvalidResetToken);
        }

        tracing::info!("Password reset completed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `InvalidInput`/`WeakPassword` for a bad new password,
    /// `IncorrectPassword` when the current one does not match and
    /// `UserNotFound` if the account is gone.
    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        id: UserId,
        request: &PasswordChangeRequest,
    ) -> Result<(), AuthError> {
        validate_new_password(
            &request.new_password,
            &request.confirm_password,
            "New passwords do not match",
        )?;
        let customer = self.get_customer(id).await?;
        verify_password(&request.current_password, &customer.password_hash)
            .map_err(|_| AuthError::IncorrectPassword)?;

        let password_hash = hash_password(&request.new_password)?;
        if !self.customers.update_password(id, &password_hash).await? {
            return Err(AuthError::UserNotFound);
        }

        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `InvalidInput`/`InvalidEmail` for bad fields,
    /// `EmailTaken`/`PhoneTaken` when another account holds the new value
    /// and `UserNotFound` if the account is gone.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Customer, AuthError> {
        let changes = update.validate()?;

        if let Some(email) = &changes.email
            && let Some(owner) = self.customers.get_by_email(email).await?
            && owner.id != id
        {
            return Err(AuthError::EmailTaken);
        }
        if let Some(phone) = &changes.phone
            && self.customers.phone_taken_by_other(phone, id).await?
        {
            return Err(AuthError::PhoneTaken);
        }

        let customer = self
            .customers
            .update_profile(
                id,
                changes.username.as_deref(),
                changes.email.as_ref(),
                changes.phone.as_deref(),
            )
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Repository(other),
            })?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %id, "Profile updated");
        Ok(customer)
    }
}

fn validate_username(username: &str) -> Result<String, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::InvalidInput("Please provide all fields".to_owned()));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AuthError::InvalidInput(format!(
            "Username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }
    Ok(username.to_owned())
}

fn validate_phone(phone: &str) -> Result<String, AuthError> {
    let phone = phone.trim();
    if !(10..=15).contains(&phone.len()) || !phone.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::InvalidInput(
            "Please enter a valid phone number".to_owned(),
        ));
    }
    Ok(phone.to_owned())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_new_password(
    password: &str,
    confirmation: &str,
    mismatch: &str,
) -> Result<(), AuthError> {
    if password != confirmation {
        return Err(AuthError::InvalidInput(mismatch.to_owned()));
    }
    validate_password(password)
}

/// 32 random bytes, hex encoded. Only the SHA-256 is stored.
fn generate_reset_token() -> String {
    use rand::Rng;
    let mut bytes = [0_u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Generate a 6-digit verification code.
#[must_use]
pub fn generate_verification_code() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_generate_verification_code_format() {
        for _ in 0..100 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..1_000_000).contains(&n));
        }
    }

    #[test]
    fn test_code_hash_is_sha256_hex() {
        let hash = hash_code("123456");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_code("123456"));
        assert_ne!(hash, hash_code("654321"));
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_registration_field_rules() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
        assert!(validate_phone("08012345678").is_ok());
        assert!(validate_phone("0801-234").is_err());
        assert!(validate_username("   ").is_err());
        assert_eq!(validate_username("  ada ").unwrap(), "ada");
    }

    #[test]
    fn test_new_password_must_match_confirmation() {
        let err = validate_new_password("longenough", "longenougH", "Passwords do not match")
            .unwrap_err();
        assert_eq!(err.public_message(), "Passwords do not match");
        assert!(matches!(
            validate_new_password("short", "short", "Passwords do not match"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_new_password("longenough", "longenough", "x").is_ok());
    }

    #[test]
    fn test_reset_token_format() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(token, generate_reset_token());
        assert_eq!(hash_code(&token).len(), 64);
        assert_ne!(hash_code(&token), token);
    }

    #[test]
    fn test_profile_update_needs_a_field() {
        let blank = ProfileUpdate {
            username: Some("   ".to_owned()),
            email: None,
            phone: Some(String::new()),
        };
        let err = blank.validate().unwrap_err();
        assert_eq!(
            err.public_message(),
            "Please provide at least one field to update"
        );
        assert!(ProfileUpdate::default().validate().is_err());
    }

    #[test]
    fn test_profile_update_validates_given_fields() {
        let update: ProfileUpdate =
            serde_json::from_str(r#"{"email": " Ada@Example.com ", "phonenumber": "08012345678"}"#)
                .unwrap();
        let changes = update.validate().unwrap();
        assert_eq!(changes.username, None);
        assert_eq!(changes.email, Some(Email::parse("ada@example.com").unwrap()));
        assert_eq!(changes.phone.as_deref(), Some("08012345678"));

        let bad_phone = ProfileUpdate {
            phone: Some("12-34".to_owned()),
            ..ProfileUpdate::default()
        };
        assert_eq!(
            bad_phone.validate().unwrap_err().public_message(),
            "Please enter a valid phone number"
        );
        let bad_email = ProfileUpdate {
            email: Some("not-an-email".to_owned()),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            bad_email.validate(),
            Err(AuthError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_reset_errors_use_reset_wording() {
        assert_eq!(AuthError::NoResetRequest.public_message(), "No reset request found");
        assert_eq!(AuthError::ResetCodeExpired.public_message(), "Verification code expired");
        assert_eq!(AuthError::InvalidResetCode.public_message(), "Invalid verification code");
        assert_eq!(AuthError::InvalidResetToken.public_message(), "Invalid reset request");
        assert_eq!(AuthError::IncorrectPassword.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_auth_error_messages_are_generic_for_login() {
        assert_eq!(
            AuthError::InvalidCredentials.public_message(),
            AuthError::UserNotFound.public_message()
        );
    }
}
