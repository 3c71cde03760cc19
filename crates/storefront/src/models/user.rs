//! Buyer account types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use texos_core::{Email, UserId};

use super::CurrentUser;

/// A registered buyer.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub phone: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[must_use]
    pub fn to_session(&self) -> CurrentUser {
        CurrentUser {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
        }
    }
}

/// A registration waiting for its emailed code.
///
/// Only hashes are stored: the argon2 hash of the chosen password and the
/// SHA-256 of the code.
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    pub email: Email,
    pub username: String,
    pub phone: String,
    pub password_hash: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PendingRegistration {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A password reset in progress.
///
/// `token_hash` is `None` until the emailed code is confirmed; from then on
/// the row can only be consumed with the matching reset token.
#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub email: Email,
    pub code_hash: String,
    pub token_hash: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_password_reset_expires_at_its_deadline() {
        let now = Utc::now();
        let reset = PasswordReset {
            email: Email::parse("ada@example.com").unwrap(),
            code_hash: String::new(),
            token_hash: None,
            expires_at: now + Duration::minutes(10),
            created_at: now,
        };
        assert!(!reset.is_expired(now));
        assert!(!reset.is_expired(now + Duration::minutes(9)));
        assert!(reset.is_expired(now + Duration::minutes(10)));
    }
}
