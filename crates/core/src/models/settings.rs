use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A key/value setting. Values are strings; numeric settings are parsed
/// by their readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
