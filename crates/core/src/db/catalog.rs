use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};

use super::PgStore;
use crate::models::{Category, Product, ProductQuery};
use crate::store::{CatalogStore, StoreResult};
use crate::types::{CategoryId, Page, ProductId};

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.category_id, c.name AS category_name, p.name, p.description,
           p.price, p.stock, p.is_new, p.created_at,
           ARRAY(
               SELECT i.image_url FROM shop.product_image i
               WHERE i.product_id = p.id
               ORDER BY i.position, i.id
           ) AS images
    FROM shop.product p
    LEFT JOIN shop.category c ON c.id = p.category_id";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: Option<CategoryId>,
    category_name: Option<String>,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
    is_new: bool,
    created_at: DateTime<Utc>,
    images: Vec<String>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            category_id: r.category_id,
            category_name: r.category_name,
            name: r.name,
            description: r.description,
            price: r.price,
            stock: r.stock,
            is_new: r.is_new,
            images: r.images,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    description: Option<String>,
}

/// Escape `LIKE` metacharacters so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        qb.push(" AND p.name ILIKE ").push_bind(like_pattern(term));
    }
    if let Some(category) = query.category {
        qb.push(" AND p.category_id = ").push_bind(category);
    }
    if let Some(max_price) = query.max_price {
        qb.push(" AND p.price <= ").push_bind(max_price);
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn browse_products(&self, query: &ProductQuery) -> StoreResult<Page<Product>> {
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM shop.product p");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut list = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
        push_filters(&mut list, query);
        list.push(" ORDER BY ")
            .push(query.sort.order_by())
            .push(" LIMIT ")
            .push_bind(query.page.limit())
            .push(" OFFSET ")
            .push_bind(query.page.offset());
        let rows: Vec<ProductRow> = list.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page::new(
            rows.into_iter().map(Product::from).collect(),
            total,
            query.page,
        ))
    }

    async fn categories(&self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description FROM shop.category ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Category {
                id: r.id,
                name: r.name,
                description: r.description,
            })
            .collect())
    }

    async fn decrement_stock(&self, id: ProductId, quantity: i32) -> StoreResult<Option<i32>> {
        let remaining = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE shop.product
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            ",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("zobo"), "%zobo%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
