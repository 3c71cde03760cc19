use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use super::PgStore;
use crate::models::{Address, AddressInput};
use crate::store::{AddressStore, StoreResult};
use crate::types::{AddressId, UserId};

const COLUMNS: &str = r"id, user_id, first_name, last_name, phone, additional_phone, street,
    additional_info, city, state, country, zip, is_default, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    first_name: String,
    last_name: String,
    phone: String,
    additional_phone: Option<String>,
    street: String,
    additional_info: Option<String>,
    city: String,
    state: String,
    country: String,
    zip: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(r: AddressRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            first_name: r.first_name,
            last_name: r.last_name,
            phone: r.phone,
            additional_phone: r.additional_phone,
            street: r.street,
            additional_info: r.additional_info,
            city: r.city,
            state: r.state,
            country: r.country,
            zip: r.zip,
            is_default: r.is_default,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

async fn clear_defaults<'e>(executor: impl PgExecutor<'e>, user_id: UserId) -> StoreResult<()> {
    sqlx::query(
        "UPDATE shop.user_address SET is_default = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl AddressStore for PgStore {
    async fn addresses(&self, user_id: UserId) -> StoreResult<Vec<Address>> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            SELECT {COLUMNS} FROM shop.user_address
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn address(&self, user_id: UserId, id: AddressId) -> StoreResult<Option<Address>> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {COLUMNS} FROM shop.user_address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Address::from))
    }

    async fn count_addresses(&self, user_id: UserId) -> StoreResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM shop.user_address WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create_address(&self, user_id: UserId, input: &AddressInput) -> StoreResult<Address> {
        let mut tx = self.pool.begin().await?;
        if input.is_default {
            clear_defaults(&mut *tx, user_id).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO shop.user_address
                (user_id, first_name, last_name, phone, additional_phone, street,
                 additional_info, city, state, country, zip, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&input.additional_phone)
        .bind(&input.street)
        .bind(&input.additional_info)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.country)
        .bind(&input.zip)
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_address(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> StoreResult<Option<Address>> {
        let mut tx = self.pool.begin().await?;

        let owned: Option<AddressId> = sqlx::query_scalar(
            "SELECT id FROM shop.user_address WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if owned.is_none() {
            return Ok(None);
        }

        if input.is_default {
            clear_defaults(&mut *tx, user_id).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE shop.user_address
            SET first_name = $3, last_name = $4, phone = $5, additional_phone = $6,
                street = $7, additional_info = $8, city = $9, state = $10,
                country = $11, zip = $12, is_default = $13, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&input.additional_phone)
        .bind(&input.street)
        .bind(&input.additional_info)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.country)
        .bind(&input.zip)
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn delete_address(&self, user_id: UserId, id: AddressId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM shop.user_address WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_default_address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> StoreResult<Option<Address>> {
        // One statement flips every row, and only when `id` is the user's.
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE shop.user_address
            SET is_default = (id = $2), updated_at = NOW()
            WHERE user_id = $1
              AND EXISTS (SELECT 1 FROM shop.user_address WHERE id = $2 AND user_id = $1)
            RETURNING {COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().find(|r| r.id == id).map(Address::from))
    }
}
