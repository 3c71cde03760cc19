use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{PgStore, constraint_error};
use crate::models::{Cart, CartItem, CartLine};
use crate::store::{CartStore, StoreResult};
use crate::types::{CartId, CartItemId, ProductId, UserId};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(r: CartItemRow) -> Self {
        Self {
            id: r.id,
            cart_id: r.cart_id,
            product_id: r.product_id,
            quantity: r.quantity,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    name: String,
    unit_price: Decimal,
    stock: i32,
    image_url: Option<String>,
    quantity: i32,
}

#[async_trait]
impl CartStore for PgStore {
    async fn get_or_create_cart(&self, user_id: UserId) -> StoreResult<Cart> {
        // The no-op update makes RETURNING yield the existing row.
        let row = sqlx::query_as::<_, CartRow>(
            r"
            INSERT INTO shop.cart (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, created_at, updated_at
            ",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Cart {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> StoreResult<Option<CartItem>> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, cart_id, product_id, quantity, created_at, updated_at
            FROM shop.cart_item
            WHERE cart_id = $1 AND product_id = $2
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CartItem::from))
    }

    async fn cart_lines(&self, cart_id: CartId) -> StoreResult<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT p.id AS product_id, p.name, p.price AS unit_price, p.stock,
                   (
                       SELECT i.image_url FROM shop.product_image i
                       WHERE i.product_id = p.id
                       ORDER BY i.position, i.id
                       LIMIT 1
                   ) AS image_url,
                   ci.quantity
            FROM shop.cart_item ci
            JOIN shop.product p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.id
            ",
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                CartLine::new(
                    r.product_id,
                    r.name,
                    r.unit_price,
                    r.stock,
                    r.image_url,
                    r.quantity,
                )
            })
            .collect())
    }

    async fn add_item_within(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
        ceiling: i32,
    ) -> StoreResult<Option<CartItem>> {
        // Both the insert and the increment are guarded by the ceiling; a
        // guarded-out upsert returns no row.
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO shop.cart_item AS ci (cart_id, product_id, quantity)
            SELECT $1, $2, $3
            WHERE $3 <= $4
            ON CONFLICT (cart_id, product_id) DO UPDATE
            SET quantity = ci.quantity + EXCLUDED.quantity, updated_at = NOW()
            WHERE ci.quantity + EXCLUDED.quantity <= $4
            RETURNING id, cart_id, product_id, quantity, created_at, updated_at
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(ceiling)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| constraint_error(e, || format!("product {product_id} does not exist")))?;
        Ok(row.map(CartItem::from))
    }

    async fn set_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<Option<CartItem>> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            UPDATE shop.cart_item
            SET quantity = $3, updated_at = NOW()
            WHERE cart_id = $1 AND product_id = $2
            RETURNING id, cart_id, product_id, quantity, created_at, updated_at
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CartItem::from))
    }

    async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id)
                .bind(product_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, cart_id: CartId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_cart_for_user(&self, user_id: UserId) -> StoreResult<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM shop.cart_item
            WHERE cart_id IN (SELECT id FROM shop.cart WHERE user_id = $1)
            ",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
