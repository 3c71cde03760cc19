//! Persistence ports.
//!
//! Each trait covers one aggregate. Engines depend on [`ShopStore`], the
//! union of all of them, and are generic over it so the same code runs
//! against Postgres in production and [`MemoryStore`] in tests.
//!
//! Every method that guards an invariant is atomic on its own: upserts,
//! conditional decrements and compare-and-set status writes must not be
//! emulated with a read followed by a write.

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::models::{
    Address, AddressInput, Cart, CartItem, CartLine, Category, NewOrder, NewOrderItem,
    NewTransaction, Order, OrderDetails, OrderItem, OrderStatusRow, Product, ProductQuery,
    Setting, StatusChange, Transaction,
};
use crate::types::{
    AddressId, CartId, OrderId, OrderStatus, Page, PageRequest, ProductId, TransactionStatus,
    UserId,
};

mod memory;

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>>;

    async fn browse_products(&self, query: &ProductQuery) -> StoreResult<Page<Product>>;

    async fn categories(&self) -> StoreResult<Vec<Category>>;

    /// `stock = stock - quantity WHERE id = ? AND stock >= quantity`.
    ///
    /// Returns the remaining stock, or `None` when the condition matched no
    /// row.
    async fn decrement_stock(&self, id: ProductId, quantity: i32) -> StoreResult<Option<i32>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Atomic get-or-create keyed on the user.
    async fn get_or_create_cart(&self, user_id: UserId) -> StoreResult<Cart>;

    async fn cart_item(&self, cart_id: CartId, product_id: ProductId)
    -> StoreResult<Option<CartItem>>;

    async fn cart_lines(&self, cart_id: CartId) -> StoreResult<Vec<CartLine>>;

    /// Insert the line or increment it, but only while the resulting
    /// quantity stays within `ceiling`. Returns `None` (and changes nothing)
    /// when the ceiling would be exceeded.
    async fn add_item_within(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
        ceiling: i32,
    ) -> StoreResult<Option<CartItem>>;

    async fn set_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<Option<CartItem>>;

    async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> StoreResult<bool>;

    async fn clear_cart(&self, cart_id: CartId) -> StoreResult<u64>;

    async fn clear_cart_for_user(&self, user_id: UserId) -> StoreResult<u64>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order in the `pending` status looked up by name.
    ///
    /// Fails with [`RepositoryError::Configuration`] if the lookup row is
    /// missing.
    async fn create_order(&self, order: &NewOrder) -> StoreResult<Order>;

    async fn add_order_item(&self, order_id: OrderId, item: &NewOrderItem)
    -> StoreResult<OrderItem>;

    /// Order plus every item in one database transaction.
    async fn create_order_with_items(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> StoreResult<OrderDetails>;

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>>;

    async fn order_items(&self, id: OrderId) -> StoreResult<Vec<OrderItem>>;

    async fn orders_for_user(&self, user_id: UserId, page: PageRequest)
    -> StoreResult<Page<Order>>;

    async fn all_orders(&self, page: PageRequest) -> StoreResult<Page<Order>>;

    async fn order_statuses(&self) -> StoreResult<Vec<OrderStatusRow>>;

    /// Compare-and-set: move the order to `to` only if its current status is
    /// one of `from`. Returns the updated order, or `None` if nothing matched.
    async fn transition_order(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> StoreResult<Option<Order>>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] on a duplicate reference.
    async fn insert_transaction(&self, transaction: &NewTransaction) -> StoreResult<Transaction>;

    async fn transaction_by_reference(&self, reference: &str) -> StoreResult<Option<Transaction>>;

    /// Most recent attempt by creation time.
    async fn latest_transaction_for_order(
        &self,
        order_id: OrderId,
    ) -> StoreResult<Option<Transaction>>;

    /// Compare-and-set by reference: write `status` only if the stored
    /// status is one of `from`, returning the status the row held just
    /// before the write. `None` when the reference is unknown or its status
    /// is not in `from`. Concurrent callers are serialized on the row, so
    /// exactly one of them observes any given previous status.
    async fn update_transaction_status(
        &self,
        reference: &str,
        from: &[TransactionStatus],
        status: TransactionStatus,
    ) -> StoreResult<Option<StatusChange>>;
}

#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Default first, then newest.
    async fn addresses(&self, user_id: UserId) -> StoreResult<Vec<Address>>;

    async fn address(&self, user_id: UserId, id: AddressId) -> StoreResult<Option<Address>>;

    async fn count_addresses(&self, user_id: UserId) -> StoreResult<i64>;

    /// Insert; when `input.is_default`, clears the other defaults in the
    /// same transaction.
    async fn create_address(&self, user_id: UserId, input: &AddressInput) -> StoreResult<Address>;

    async fn update_address(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> StoreResult<Option<Address>>;

    async fn delete_address(&self, user_id: UserId, id: AddressId) -> StoreResult<bool>;

    /// Unset every default for the user then set `id`, as one unit. Returns
    /// `None` and leaves the defaults untouched if `id` is not the user's.
    async fn set_default_address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> StoreResult<Option<Address>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn settings(&self) -> StoreResult<Vec<Setting>>;

    async fn setting(&self, key: &str) -> StoreResult<Option<Setting>>;

    /// Update an existing key. Returns `None` for unknown keys.
    async fn update_setting(&self, key: &str, value: &str) -> StoreResult<Option<Setting>>;
}

/// Every store the engines need.
pub trait ShopStore:
    CatalogStore + CartStore + OrderStore + TransactionStore + AddressStore + SettingsStore
{
}

impl<T> ShopStore for T where
    T: CatalogStore + CartStore + OrderStore + TransactionStore + AddressStore + SettingsStore
{
}
