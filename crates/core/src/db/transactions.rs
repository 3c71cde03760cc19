use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{PgStore, constraint_error, corrupt};
use crate::error::RepositoryError;
use crate::models::{NewTransaction, StatusChange, Transaction};
use crate::store::{StoreResult, TransactionStore};
use crate::types::{OrderId, TransactionId, TransactionStatus};

const COLUMNS: &str =
    "id, order_id, reference, amount, status, customer_email, metadata, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: TransactionId,
    order_id: OrderId,
    reference: String,
    amount: Decimal,
    status: String,
    customer_email: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = RepositoryError;

    fn try_from(r: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            order_id: r.order_id,
            reference: r.reference,
            amount: r.amount,
            status: r.status.parse().map_err(|e| corrupt("transaction status", e))?,
            customer_email: r.customer_email,
            metadata: r.metadata,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatusChangeRow {
    #[sqlx(flatten)]
    transaction: TransactionRow,
    previous_status: String,
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn insert_transaction(&self, transaction: &NewTransaction) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r"
            INSERT INTO shop.payment_transaction
                (order_id, reference, amount, status, customer_email, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COLUMNS}
            "
        ))
        .bind(transaction.order_id)
        .bind(&transaction.reference)
        .bind(transaction.amount)
        .bind(transaction.status.as_str())
        .bind(&transaction.customer_email)
        .bind(&transaction.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            constraint_error(e, || {
                format!("transaction reference {} already exists", transaction.reference)
            })
        })?;
        Transaction::try_from(row)
    }

    async fn transaction_by_reference(&self, reference: &str) -> StoreResult<Option<Transaction>> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {COLUMNS} FROM shop.payment_transaction WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?
        .map(Transaction::try_from)
        .transpose()
    }

    async fn latest_transaction_for_order(
        &self,
        order_id: OrderId,
    ) -> StoreResult<Option<Transaction>> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            r"
            SELECT {COLUMNS} FROM shop.payment_transaction
            WHERE order_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Transaction::try_from)
        .transpose()
    }

    async fn update_transaction_status(
        &self,
        reference: &str,
        from: &[TransactionStatus],
        status: TransactionStatus,
    ) -> StoreResult<Option<StatusChange>> {
        let sources: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        // The locking subselect reads the status under the row lock, so a
        // second concurrent writer sees the first writer's value as previous.
        let row = sqlx::query_as::<_, StatusChangeRow>(
            r"
            UPDATE shop.payment_transaction t
            SET status = $2, updated_at = NOW()
            FROM (
                SELECT id, status AS previous_status
                FROM shop.payment_transaction
                WHERE reference = $1
                FOR UPDATE
            ) old
            WHERE t.id = old.id
              AND old.previous_status = ANY($3)
            RETURNING t.id, t.order_id, t.reference, t.amount, t.status, t.customer_email,
                      t.metadata, t.created_at, t.updated_at, old.previous_status
            ",
        )
        .bind(reference)
        .bind(status.as_str())
        .bind(sources)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(StatusChange {
                previous: r
                    .previous_status
                    .parse()
                    .map_err(|e| corrupt("transaction status", e))?,
                transaction: Transaction::try_from(r.transaction)?,
            })
        })
        .transpose()
    }
}
