//! Orders and their line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Transaction;
use crate::types::{AddressId, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

/// An order. Only `status` and `updated_at` change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub address_id: Option<AddressId>,
    /// Cart total at checkout. Never recomputed.
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: Option<String>,
    pub quantity: i32,
    /// Catalog price at the time of checkout.
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Back-office view of an order: its lines and the most recent payment
/// attempt, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminOrderView {
    #[serde(flatten)]
    pub details: OrderDetails,
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub address_id: Option<AddressId>,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A row of the persisted `order_status` lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusRow {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}
