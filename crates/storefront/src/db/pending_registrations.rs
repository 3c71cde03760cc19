//! OTP registrations.
//!
//! A row is keyed by email. A new request may replace a row only once it
//! has expired, so a live code cannot be overwritten by a second request.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use texos_core::Email;

use super::customers::{CUSTOMER_COLUMNS, CustomerRow};
use super::{RepositoryError, stored_email};
use crate::models::{Customer, PendingRegistration};

#[derive(sqlx::FromRow)]
struct PendingRow {
    email: String,
    username: String,
    phone: Option<String>,
    password_hash: String,
    code_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PendingRow> for PendingRegistration {
    type Error = RepositoryError;

    fn try_from(row: PendingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            email: stored_email(&row.email)?,
            username: row.username,
            phone: row.phone.unwrap_or_default(),
            password_hash: row.password_hash,
            code_hash: row.code_hash,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

const PENDING_COLUMNS: &str =
    "email, username, phone, password_hash, code_hash, expires_at, created_at";

pub struct PendingRegistrationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PendingRegistrationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a registration, replacing an expired one for the same email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a live registration exists.
    pub async fn insert(&self, pending: &PendingRegistration) -> Result<(), RepositoryError> {
        let inserted = sqlx::query_scalar::<_, String>(
            r"
            INSERT INTO shop.pending_registration AS p
                (email, username, phone, password_hash, code_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE
                SET username = EXCLUDED.username,
                    phone = EXCLUDED.phone,
                    password_hash = EXCLUDED.password_hash,
                    code_hash = EXCLUDED.code_hash,
                    expires_at = EXCLUDED.expires_at,
                    created_at = NOW()
                WHERE p.expires_at <= NOW()
            RETURNING email
            ",
        )
        .bind(&pending.email)
        .bind(&pending.username)
        .bind(&pending.phone)
        .bind(&pending.password_hash)
        .bind(&pending.code_hash)
        .bind(pending.expires_at)
        .fetch_optional(self.pool)
        .await?;

        if inserted.is_none() {
            return Err(RepositoryError::Conflict(
                "registration already pending".to_owned(),
            ));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, email: &Email) -> Result<Option<PendingRegistration>, RepositoryError> {
        let row = sqlx::query_as::<_, PendingRow>(&format!(
            "SELECT {PENDING_COLUMNS} FROM shop.pending_registration WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;
        row.map(PendingRegistration::try_from).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, email: &Email) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.pending_registration WHERE email = $1")
            .bind(email)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Consume the registration and create the customer in one transaction.
    ///
    /// The delete is keyed on the code hash, so two concurrent
    /// confirmations create at most one account. Returns `None` when the
    /// row was already consumed or replaced.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email was registered in
    /// the meantime.
    pub async fn complete(
        &self,
        email: &Email,
        code_hash: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(pending) = sqlx::query_as::<_, PendingRow>(&format!(
            r"
            DELETE FROM shop.pending_registration
            WHERE email = $1 AND code_hash = $2 AND expires_at > NOW()
            RETURNING {PENDING_COLUMNS}
            "
        ))
        .bind(email)
        .bind(code_hash)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            INSERT INTO shop.customer (username, email, phone, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(&pending.username)
        .bind(&pending.email)
        .bind(&pending.phone)
        .bind(&pending.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        tx.commit().await?;
        Customer::try_from(row).map(Some)
    }
}
