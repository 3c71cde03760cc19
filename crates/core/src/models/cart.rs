//! Cart records and the guest-cart merge report.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::CartTotals;
use crate::types::{CartId, CartItemId, ProductId, UserId, round_money};

/// One cart per user, created lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored cart row. Unique on `(cart_id, product_id)`; `quantity >= 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart item joined with its live catalog data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    /// Current catalog price; carts are not price-locked.
    pub unit_price: Decimal,
    pub stock: i32,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub line_total: Decimal,
}

impl CartLine {
    #[must_use]
    pub fn new(
        product_id: ProductId,
        name: String,
        unit_price: Decimal,
        stock: i32,
        image_url: Option<String>,
        quantity: i32,
    ) -> Self {
        Self {
            product_id,
            name,
            unit_price,
            stock,
            image_url,
            quantity,
            line_total: round_money(unit_price * Decimal::from(quantity)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub cart: Cart,
    pub items: Vec<CartLine>,
    pub totals: CartTotals,
}

/// A line from the client-side guest cart.
///
/// The descriptive fields mirror what the browser stored at add time and are
/// accepted only for shape compatibility; merge trusts `product_id` and
/// `quantity` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCartLine {
    pub product_id: ProductId,
    pub quantity: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub stock: Option<i32>,
}

impl GuestCartLine {
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
            name: None,
            price: None,
            image: None,
            stock: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeError {
    pub product_id: ProductId,
    pub error: String,
}

/// Outcome of merging a guest cart: per-line failures never abort the merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub merged_count: usize,
    pub errors: Vec<MergeError>,
}
