//! Password reset codes.
//!
//! Keyed by customer email like `pending_registration`: a live row cannot
//! be replaced, and every write re-checks `expires_at` in SQL so a row read
//! just before its deadline cannot be used just after it.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use texos_core::Email;

use super::{RepositoryError, stored_email};
use crate::models::PasswordReset;

#[derive(sqlx::FromRow)]
struct ResetRow {
    email: String,
    code_hash: String,
    token_hash: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ResetRow> for PasswordReset {
    type Error = RepositoryError;

    fn try_from(row: ResetRow) -> Result<Self, Self::Error> {
        Ok(Self {
            email: stored_email(&row.email)?,
            code_hash: row.code_hash,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

const RESET_COLUMNS: &str = "email, code_hash, token_hash, expires_at, created_at";

pub struct PasswordResetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PasswordResetRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Start a reset, replacing an expired one for the same email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a live reset exists.
    pub async fn insert(&self, reset: &PasswordReset) -> Result<(), RepositoryError> {
        let inserted = sqlx::query_scalar::<_, String>(
            r"
            INSERT INTO shop.password_reset AS r (email, code_hash, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
                SET code_hash = EXCLUDED.code_hash,
                    token_hash = NULL,
                    expires_at = EXCLUDED.expires_at,
                    created_at = NOW()
                WHERE r.expires_at <= NOW()
            RETURNING email
            ",
        )
        .bind(&reset.email)
        .bind(&reset.code_hash)
        .bind(reset.expires_at)
        .fetch_optional(self.pool)
        .await?;

        if inserted.is_none() {
            return Err(RepositoryError::Conflict("reset already pending".to_owned()));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, email: &Email) -> Result<Option<PasswordReset>, RepositoryError> {
        let row = sqlx::query_as::<_, ResetRow>(&format!(
            "SELECT {RESET_COLUMNS} FROM shop.password_reset WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;
        row.map(PasswordReset::try_from).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, email: &Email) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.password_reset WHERE email = $1")
            .bind(email)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Attach a reset token to a live row whose code matches, moving its
    /// deadline to `expires_at`. Returns `false` when the row is gone,
    /// expired or holds a different code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn issue_token(
        &self,
        email: &Email,
        code_hash: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.password_reset
            SET token_hash = $3, expires_at = $4
            WHERE email = $1 AND code_hash = $2 AND expires_at > NOW()
            ",
        )
        .bind(email)
        .bind(code_hash)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Consume the reset and store the new password hash in one
    /// transaction. Returns `false` when no live row carries `token_hash`,
    /// so a token works at most once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn complete(
        &self,
        email: &Email,
        token_hash: &str,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query_scalar::<_, String>(
            r"
            DELETE FROM shop.password_reset
            WHERE email = $1 AND token_hash = $2 AND expires_at > NOW()
            RETURNING email
            ",
        )
        .bind(email)
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?;
        if consumed.is_none() {
            return Ok(false);
        }

        let updated = sqlx::query(
            "UPDATE shop.customer SET password_hash = $2, updated_at = NOW() WHERE email = $1",
        )
        .bind(email)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }
}
