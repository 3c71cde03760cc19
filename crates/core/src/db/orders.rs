use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgExecutor;

use super::{PgStore, corrupt};
use crate::error::RepositoryError;
use crate::models::{NewOrder, NewOrderItem, Order, OrderDetails, OrderItem, OrderStatusRow};
use crate::store::{OrderStore, StoreResult};
use crate::types::{
    AddressId, OrderId, OrderItemId, OrderStatus, Page, PageRequest, ProductId, UserId,
};

const ORDER_SELECT: &str = r"
    SELECT o.id, o.user_id, o.address_id, o.total_amount, s.name AS status,
           o.created_at, o.updated_at
    FROM shop.orders o
    JOIN shop.order_status s ON s.id = o.status_id";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    address_id: Option<AddressId>,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            address_id: r.address_id,
            total_amount: r.total_amount,
            status: r.status.parse().map_err(|e| corrupt("order status", e))?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    product_name: Option<String>,
    quantity: i32,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: r.id,
            order_id: r.order_id,
            product_id: r.product_id,
            product_name: r.product_name,
            quantity: r.quantity,
            unit_price: r.unit_price,
        }
    }
}

fn orders_from(rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

async fn insert_order<'e>(executor: impl PgExecutor<'e>, order: &NewOrder) -> StoreResult<Order> {
    let row = sqlx::query_as::<_, OrderRow>(
        r"
        WITH status AS (
            SELECT id, name FROM shop.order_status WHERE name = $4
        )
        INSERT INTO shop.orders (user_id, address_id, total_amount, status_id)
        SELECT $1, $2, $3, status.id FROM status
        RETURNING id, user_id, address_id, total_amount, $4 AS status, created_at, updated_at
        ",
    )
    .bind(order.user_id)
    .bind(order.address_id)
    .bind(order.total_amount)
    .bind(OrderStatus::Pending.as_str())
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| {
        RepositoryError::Configuration("order status 'pending' is missing".to_owned())
    })?;
    Order::try_from(row)
}

async fn insert_order_item<'e>(
    executor: impl PgExecutor<'e>,
    order_id: OrderId,
    item: &NewOrderItem,
) -> StoreResult<OrderItem> {
    let row = sqlx::query_as::<_, OrderItemRow>(
        r"
        WITH inserted AS (
            INSERT INTO shop.order_item (order_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, product_id, quantity, unit_price
        )
        SELECT i.id, i.order_id, i.product_id, p.name AS product_name, i.quantity, i.unit_price
        FROM inserted i
        LEFT JOIN shop.product p ON p.id = i.product_id
        ",
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return if db_err.constraint() == Some("order_item_order_id_fkey") {
                RepositoryError::NotFound
            } else {
                RepositoryError::Conflict(format!("product {} does not exist", item.product_id))
            };
        }
        RepositoryError::Database(e)
    })?;
    Ok(row.into())
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(&self, order: &NewOrder) -> StoreResult<Order> {
        insert_order(&self.pool, order).await
    }

    async fn add_order_item(
        &self,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> StoreResult<OrderItem> {
        insert_order_item(&self.pool, order_id, item).await
    }

    async fn create_order_with_items(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> StoreResult<OrderDetails> {
        let mut tx = self.pool.begin().await?;

        let order = insert_order(&mut *tx, order).await?;
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            rows.push(insert_order_item(&mut *tx, order.id, item).await?);
        }

        tx.commit().await?;
        Ok(OrderDetails { order, items: rows })
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn order_items(&self, id: OrderId) -> StoreResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT i.id, i.order_id, i.product_id, p.name AS product_name,
                   i.quantity, i.unit_price
            FROM shop.order_item i
            LEFT JOIN shop.product p ON p.id = i.product_id
            WHERE i.order_id = $1
            ORDER BY i.id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn orders_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> StoreResult<Page<Order>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop.orders WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{ORDER_SELECT} WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(orders_from(rows)?, total, page))
    }

    async fn all_orders(&self, page: PageRequest) -> StoreResult<Page<Order>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.orders")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{ORDER_SELECT} ORDER BY o.created_at DESC, o.id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(orders_from(rows)?, total, page))
    }

    async fn order_statuses(&self) -> StoreResult<Vec<OrderStatusRow>> {
        let rows = sqlx::query_as::<_, (i32, String, Option<String>)>(
            "SELECT id, name, description FROM shop.order_status ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, description)| OrderStatusRow {
                id,
                name,
                description,
            })
            .collect())
    }

    async fn transition_order(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> StoreResult<Option<Order>> {
        let sources: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE shop.orders o
            SET status_id = target.id, updated_at = NOW()
            FROM shop.order_status target, shop.order_status prior
            WHERE o.id = $1
              AND target.name = $2
              AND prior.id = o.status_id
              AND prior.name = ANY($3)
            RETURNING o.id, o.user_id, o.address_id, o.total_amount, target.name AS status,
                      o.created_at, o.updated_at
            ",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(sources)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Order::try_from(row).map(Some);
        }

        let known: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop.order_status WHERE name = $1)")
                .bind(to.as_str())
                .fetch_one(&self.pool)
                .await?;
        if known {
            Ok(None)
        } else {
            Err(RepositoryError::Configuration(format!(
                "order status '{to}' is missing"
            )))
        }
    }
}
