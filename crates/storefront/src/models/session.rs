//! Session-related types.

use serde::{Deserialize, Serialize};

use texos_core::{Email, UserId};

/// Session-stored buyer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub username: String,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in buyer.
    pub const CURRENT_USER: &str = "current_user";
}
