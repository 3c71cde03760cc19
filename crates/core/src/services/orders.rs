//! Order engine: cart snapshot into order, history, admin status changes.

use rust_decimal::Decimal;
use tracing::instrument;

use crate::error::{ShopError, ShopResult};
use crate::models::{
    AdminOrderView, NewOrder, NewOrderItem, Order, OrderDetails, OrderItem, OrderStatusRow,
};
use crate::pricing::compute_totals;
use crate::services::SettingsService;
use crate::store::ShopStore;
use crate::types::{AddressId, OrderId, OrderStatus, Page, PageRequest, ProductId, UserId};

pub struct OrderService<'a, S> {
    store: &'a S,
}

impl<'a, S: ShopStore> OrderService<'a, S> {
    /// Default page size for a buyer's order history.
    pub const HISTORY_PER_PAGE: u32 = 5;
    /// Default page size for the admin order list.
    pub const ADMIN_PER_PAGE: u32 = 10;

    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Insert a `pending` order with a caller-computed total.
    ///
    /// # Errors
    ///
    /// `Internal` if the `pending` status row is missing.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        total_amount: Decimal,
        address_id: Option<AddressId>,
    ) -> ShopResult<Order> {
        Ok(self
            .store
            .create_order(&NewOrder {
                user_id,
                address_id,
                total_amount,
            })
            .await?)
    }

    /// Append a line with its unit price frozen at call time.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown order.
    #[instrument(skip(self))]
    pub async fn add_order_item(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: i32,
        unit_price: Decimal,
    ) -> ShopResult<OrderItem> {
        Ok(self
            .store
            .add_order_item(
                order_id,
                &NewOrderItem {
                    product_id,
                    quantity,
                    unit_price,
                },
            )
            .await?)
    }

    /// Snapshot the buyer's cart into a new `pending` order.
    ///
    /// The order and its items are written in one transaction. The cart is
    /// left as it is; it is cleared only when payment is confirmed.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty cart, `NotFound` for an address that is not
    /// the buyer's and `Conflict` if a line now exceeds stock.
    #[instrument(skip(self))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        address_id: Option<AddressId>,
    ) -> ShopResult<OrderDetails> {
        let cart = self.store.get_or_create_cart(user_id).await?;
        let lines = self.store.cart_lines(cart.id).await?;
        if lines.is_empty() {
            return Err(ShopError::Validation("Cart is empty".to_owned()));
        }

        if let Some(address_id) = address_id
            && self.store.address(user_id, address_id).await?.is_none()
        {
            return Err(ShopError::not_found("Address"));
        }

        if let Some(line) = lines.iter().find(|l| l.quantity > l.stock) {
            return Err(ShopError::Conflict(format!(
                "Only {} of {} available in stock",
                line.stock.max(0),
                line.name
            )));
        }

        let pricing = SettingsService::new(self.store).pricing().await?;
        let totals = compute_totals(lines.iter().map(|l| (l.unit_price, l.quantity)), &pricing);

        let items: Vec<NewOrderItem> = lines
            .iter()
            .map(|line| NewOrderItem {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        let details = self
            .store
            .create_order_with_items(
                &NewOrder {
                    user_id,
                    address_id,
                    total_amount: totals.total,
                },
                &items,
            )
            .await?;

        tracing::info!(
            order_id = %details.order.id,
            total = %details.order.total_amount,
            items = details.items.len(),
            "Order created"
        );
        Ok(details)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown order.
    pub async fn get_order(&self, id: OrderId) -> ShopResult<OrderDetails> {
        let order = self
            .store
            .order(id)
            .await?
            .ok_or_else(|| ShopError::not_found("Order"))?;
        let items = self.store.order_items(id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Order, lines and the latest payment attempt.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown order.
    pub async fn order_details(&self, id: OrderId) -> ShopResult<AdminOrderView> {
        let details = self.get_order(id).await?;
        let transaction = self.store.latest_transaction_for_order(id).await?;
        Ok(AdminOrderView {
            details,
            transaction,
        })
    }

    /// Like [`Self::get_order`], but another buyer's order is reported as
    /// missing.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or foreign orders.
    pub async fn get_order_for_user(&self, user_id: UserId, id: OrderId) -> ShopResult<OrderDetails> {
        let details = self.get_order(id).await?;
        if details.order.user_id != user_id {
            return Err(ShopError::not_found("Order"));
        }
        Ok(details)
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn list_orders_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> ShopResult<Page<Order>> {
        Ok(self.store.orders_for_user(user_id, page).await?)
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn list_all_orders(&self, page: PageRequest) -> ShopResult<Page<Order>> {
        Ok(self.store.all_orders(page).await?)
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn order_statuses(&self) -> ShopResult<Vec<OrderStatusRow>> {
        Ok(self.store.order_statuses().await?)
    }

    /// Admin status override.
    ///
    /// The move must be an edge of the order state machine. `pending` to
    /// `paid` is refused here because only payment reconciliation may take
    /// that edge (it is the one that decrements stock).
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown order, `Conflict` for a disallowed move or
    /// a concurrent change.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: OrderId, target: OrderStatus) -> ShopResult<Order> {
        let order = self
            .store
            .order(id)
            .await?
            .ok_or_else(|| ShopError::not_found("Order"))?;

        if order.status == target {
            return Ok(order);
        }
        if order.status == OrderStatus::Pending && target == OrderStatus::Paid {
            return Err(ShopError::Conflict(
                "Pending orders become paid only through payment reconciliation".to_owned(),
            ));
        }
        if !order.status.can_transition_to(target) {
            return Err(ShopError::Conflict(format!(
                "Cannot change order status from {} to {target}",
                order.status
            )));
        }

        let updated = self
            .store
            .transition_order(id, &[order.status], target)
            .await?
            .ok_or_else(|| {
                ShopError::Conflict("Order status changed concurrently; reload and retry".to_owned())
            })?;

        tracing::info!(order_id = %id, from = %order.status, to = %target, "Order status overridden");
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::AddressInput;
    use crate::services::CartService;
    use crate::store::{AddressStore, CartStore, MemoryStore};

    const BUYER: UserId = UserId::new(7);

    #[tokio::test]
    async fn test_empty_cart_checkout_creates_nothing() {
        let store = MemoryStore::new();
        let err = OrderService::new(&store)
            .checkout(BUYER, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_checkout_snapshots_without_clearing_cart() {
        let store = MemoryStore::new();
        let zobo = store.add_product("Zobo", Decimal::from(1500), 10);
        let kunu = store.add_product("Kunu", Decimal::from(1200), 10);
        let carts = CartService::new(&store);
        let cart = carts.get_or_create_cart(BUYER).await.unwrap();
        carts.add_item(cart.id, zobo, 2).await.unwrap();
        carts.add_item(cart.id, kunu, 1).await.unwrap();

        let details = OrderService::new(&store).checkout(BUYER, None).await.unwrap();
        assert_eq!(details.order.status, OrderStatus::Pending);
        assert_eq!(details.order.total_amount, Decimal::from(4200));
        assert_eq!(details.items.len(), 2);

        assert_eq!(store.cart_lines(cart.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_total_is_stable_after_price_change() {
        let store = MemoryStore::new();
        let zobo = store.add_product("Zobo", Decimal::from(1500), 10);
        let carts = CartService::new(&store);
        let cart = carts.get_or_create_cart(BUYER).await.unwrap();
        carts.add_item(cart.id, zobo, 2).await.unwrap();

        let orders = OrderService::new(&store);
        let created = orders.checkout(BUYER, None).await.unwrap();

        store.set_price(zobo, Decimal::from(9999));
        let reloaded = orders.get_order(created.order.id).await.unwrap();
        assert_eq!(reloaded.order.total_amount, Decimal::from(3000));
        assert_eq!(reloaded.items[0].unit_price, Decimal::from(1500));
    }

    #[tokio::test]
    async fn test_checkout_rejects_foreign_address() {
        let store = MemoryStore::new();
        let zobo = store.add_product("Zobo", Decimal::from(1500), 10);
        let carts = CartService::new(&store);
        let cart = carts.get_or_create_cart(BUYER).await.unwrap();
        carts.add_item(cart.id, zobo, 1).await.unwrap();

        let other = store
            .create_address(UserId::new(99), &AddressInput::default())
            .await
            .unwrap();
        let err = OrderService::new(&store)
            .checkout(BUYER, Some(other.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::NotFound(_)));
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_pending_status_is_internal() {
        let store = MemoryStore::without_order_statuses();
        let err = OrderService::new(&store)
            .create_order(BUYER, Decimal::ONE, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_foreign_order_is_not_found() {
        let store = MemoryStore::new();
        let orders = OrderService::new(&store);
        let order = orders.create_order(BUYER, Decimal::ONE, None).await.unwrap();
        assert!(orders.get_order_for_user(BUYER, order.id).await.is_ok());
        assert!(matches!(
            orders.get_order_for_user(UserId::new(8), order.id).await,
            Err(ShopError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_is_paginated_newest_first() {
        let store = MemoryStore::new();
        let orders = OrderService::new(&store);
        for _ in 0..7 {
            orders.create_order(BUYER, Decimal::ONE, None).await.unwrap();
        }
        let page = orders
            .list_orders_for_user(BUYER, PageRequest::new(Some(2), None, 5))
            .await
            .unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].id > page.items[1].id);
    }

    #[tokio::test]
    async fn test_order_details_carry_latest_transaction() {
        use crate::models::NewTransaction;
        use crate::store::TransactionStore;
        use crate::types::TransactionStatus;

        let store = MemoryStore::new();
        let orders = OrderService::new(&store);
        let order = orders.create_order(BUYER, Decimal::ONE, None).await.unwrap();
        assert!(orders.order_details(order.id).await.unwrap().transaction.is_none());

        for reference in ["TXfirst", "TXsecond"] {
            store
                .insert_transaction(&NewTransaction {
                    order_id: order.id,
                    reference: reference.to_owned(),
                    amount: Decimal::ONE,
                    status: TransactionStatus::Pending,
                    customer_email: "buyer@texos.ng".to_owned(),
                    metadata: serde_json::json!({}),
                })
                .await
                .unwrap();
        }
        let view = orders.order_details(order.id).await.unwrap();
        assert_eq!(view.transaction.unwrap().reference, "TXsecond");
    }

    #[tokio::test]
    async fn test_admin_override_follows_state_machine() {
        let store = MemoryStore::new();
        let orders = OrderService::new(&store);
        let order = orders.create_order(BUYER, Decimal::ONE, None).await.unwrap();

        assert!(matches!(
            orders.set_status(order.id, OrderStatus::Paid).await,
            Err(ShopError::Conflict(_))
        ));
        assert!(matches!(
            orders.set_status(order.id, OrderStatus::Refunded).await,
            Err(ShopError::Conflict(_))
        ));

        let cancelled = orders
            .set_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }
}
