//! Session-related types for admin authentication.

use serde::{Deserialize, Serialize};

use texos_core::{AdminUserId, Email};

use super::admin_user::AdminRole;

/// Session-stored admin identity.
///
/// Minimal data stored in the session to identify the logged-in admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Admin's database ID.
    pub id: AdminUserId,
    /// Admin's email address.
    pub email: Email,
    /// Admin's display name.
    pub name: String,
    /// Admin's role/permission level.
    pub role: AdminRole,
}

impl CurrentAdmin {
    /// Order status edits, reconciliation and settings need write access.
    #[must_use]
    pub const fn can_write(&self) -> bool {
        self.role.can_write()
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";
}
