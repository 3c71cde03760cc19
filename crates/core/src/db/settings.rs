use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PgStore;
use crate::models::Setting;
use crate::store::{SettingsStore, StoreResult};

#[derive(sqlx::FromRow)]
struct SettingRow {
    key: String,
    value: String,
    updated_at: DateTime<Utc>,
}

impl From<SettingRow> for Setting {
    fn from(r: SettingRow) -> Self {
        Self {
            key: r.key,
            value: r.value,
            updated_at: r.updated_at,
        }
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn settings(&self) -> StoreResult<Vec<Setting>> {
        let rows = sqlx::query_as::<_, SettingRow>(
            "SELECT key, value, updated_at FROM shop.setting ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Setting::from).collect())
    }

    async fn setting(&self, key: &str) -> StoreResult<Option<Setting>> {
        let row = sqlx::query_as::<_, SettingRow>(
            "SELECT key, value, updated_at FROM shop.setting WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Setting::from))
    }

    async fn update_setting(&self, key: &str, value: &str) -> StoreResult<Option<Setting>> {
        let row = sqlx::query_as::<_, SettingRow>(
            r"
            UPDATE shop.setting SET value = $2, updated_at = NOW()
            WHERE key = $1
            RETURNING key, value, updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Setting::from))
    }
}
