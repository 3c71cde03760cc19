//! Catalog records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, PageRequest, ProductId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

/// A sellable product. `stock` is never negative; the only write path that
/// lowers it is the conditional decrement run by payment reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub is_new: bool,
    /// Image URLs in display order; the first is the primary image.
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Allow-listed catalog sort orders. Sort keys from the query string are
/// deserialized into this enum and never reach SQL as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductSort {
    #[default]
    Name,
    PriceLow,
    PriceHigh,
    Newest,
}

impl ProductSort {
    /// `ORDER BY` clause for the product listing query.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Name => "p.name ASC, p.id ASC",
            Self::PriceLow => "p.price ASC, p.id ASC",
            Self::PriceHigh => "p.price DESC, p.id ASC",
            Self::Newest => "p.created_at DESC, p.id DESC",
        }
    }
}

/// Catalog browse filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<CategoryId>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    pub page: PageRequest,
}

impl ProductQuery {
    pub const DEFAULT_PER_PAGE: u32 = 6;
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            max_price: None,
            sort: ProductSort::default(),
            page: PageRequest::new(None, None, Self::DEFAULT_PER_PAGE),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_keys_from_query_string() {
        let sort: ProductSort = serde_json::from_str("\"priceHigh\"").unwrap();
        assert_eq!(sort, ProductSort::PriceHigh);
        assert!(serde_json::from_str::<ProductSort>("\"price; DROP TABLE\"").is_err());
    }
}
