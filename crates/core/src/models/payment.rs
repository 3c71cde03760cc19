//! Payment transaction records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{OrderId, ProductId, TransactionId, TransactionStatus};

/// One payment attempt for an order, keyed by the gateway reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub order_id: OrderId,
    pub reference: String,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub customer_email: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub order_id: OrderId,
    pub reference: String,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub customer_email: String,
    pub metadata: serde_json::Value,
}

/// Result of a status write: the row after the update and the status it
/// held immediately before, read under the same lock.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub transaction: Transaction,
    pub previous: TransactionStatus,
}

/// What happened to one order line during fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub quantity: i32,
    /// Stock after the decrement, or `None` if the conditional write
    /// matched no row.
    pub remaining: Option<i32>,
}
