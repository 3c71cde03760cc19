//! Admin user domain types.
//!
//! Staff accounts live in the `admin` schema, apart from buyer accounts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use texos_core::{AdminUserId, Email};

// Re-export AdminRole from core for convenience
pub use texos_core::AdminRole;

use super::CurrentAdmin;

/// An admin user (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct AdminUser {
    pub id: AdminUserId,
    pub email: Email,
    pub name: String,
    pub role: AdminRole,
    /// Argon2id PHC string.
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminUser {
    #[must_use]
    pub fn to_session(&self) -> CurrentAdmin {
        CurrentAdmin {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}
