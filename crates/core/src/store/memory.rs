//! In-memory store.
//!
//! Implements every store trait over a single mutex so each method is
//! atomic in the same way the Postgres statements are. Used by the test
//! suites and for running the engines without a database.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use super::{
    AddressStore, CartStore, CatalogStore, OrderStore, SettingsStore, StoreResult,
    TransactionStore,
};
use crate::error::RepositoryError;
use crate::models::{
    Address, AddressInput, Cart, CartItem, CartLine, Category, NewOrder, NewOrderItem,
    NewTransaction, Order, OrderDetails, OrderItem, OrderStatusRow, Product, ProductQuery,
    Setting, StatusChange, Transaction,
};
use crate::pricing::{DELIVERY_FEE_KEY, FREE_DELIVERY_THRESHOLD_KEY, PricingSettings};
use crate::types::{
    AddressId, CartId, CartItemId, CategoryId, OrderId, OrderItemId, OrderStatus, Page,
    PageRequest, ProductId, TransactionId, TransactionStatus, UserId,
};

#[derive(Debug, Default)]
struct State {
    next_id: i32,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, Cart>,
    cart_items: Vec<CartItem>,
    orders: BTreeMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
    statuses: Vec<OrderStatusRow>,
    transactions: Vec<Transaction>,
    addresses: Vec<Address>,
    settings: BTreeMap<String, Setting>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn product_name(&self, id: ProductId) -> Option<String> {
        self.products.get(&id).map(|p| p.name.clone())
    }

    fn insert_order(&mut self, order: &NewOrder) -> StoreResult<Order> {
        if !self
            .statuses
            .iter()
            .any(|s| s.name == OrderStatus::Pending.as_str())
        {
            return Err(RepositoryError::Configuration(
                "order status 'pending' is missing".to_owned(),
            ));
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(self.next_id()),
            user_id: order.user_id,
            address_id: order.address_id,
            total_amount: order.total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    fn insert_order_item(
        &mut self,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> StoreResult<OrderItem> {
        let product_name = self.product_name(item.product_id).ok_or_else(|| {
            RepositoryError::Conflict(format!("product {} does not exist", item.product_id))
        })?;

        let row = OrderItem {
            id: OrderItemId::new(self.next_id()),
            order_id,
            product_id: item.product_id,
            product_name: Some(product_name),
            quantity: item.quantity,
            unit_price: item.unit_price,
        };
        self.order_items.push(row.clone());
        Ok(row)
    }

    fn clear_defaults(&mut self, user_id: UserId) {
        for address in self.addresses.iter_mut().filter(|a| a.user_id == user_id) {
            address.is_default = false;
        }
    }
}

fn page_of<T: Clone>(rows: &[T], page: PageRequest) -> Page<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(0);
    let items = rows.iter().skip(offset).take(limit).cloned().collect();
    let total = i64::try_from(rows.len()).unwrap_or(i64::MAX);
    Page::new(items, total, page)
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// In-memory implementation of every store trait.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store with the order status lookup rows and default pricing
    /// settings already seeded.
    #[must_use]
    pub fn new() -> Self {
        let store = Self::without_order_statuses();
        {
            let mut state = store.lock();
            state.statuses = OrderStatus::ALL
                .iter()
                .zip(1..)
                .map(|(status, id)| OrderStatusRow {
                    id,
                    name: status.as_str().to_owned(),
                    description: None,
                })
                .collect();
            let defaults = PricingSettings::default();
            let now = Utc::now();
            for (key, value) in [
                (FREE_DELIVERY_THRESHOLD_KEY, defaults.free_delivery_threshold),
                (DELIVERY_FEE_KEY, defaults.delivery_fee),
            ] {
                state.settings.insert(
                    key.to_owned(),
                    Setting {
                        key: key.to_owned(),
                        value: value.to_string(),
                        updated_at: now,
                    },
                );
            }
        }
        store
    }

    /// A store missing the status lookup rows, for exercising the
    /// misconfiguration path.
    #[must_use]
    pub fn without_order_statuses() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_category(&self, name: &str) -> CategoryId {
        let mut state = self.lock();
        let id = CategoryId::new(state.next_id());
        state.categories.insert(
            id,
            Category {
                id,
                name: name.to_owned(),
                description: None,
            },
        );
        id
    }

    pub fn add_product(&self, name: &str, price: Decimal, stock: i32) -> ProductId {
        let mut state = self.lock();
        let id = ProductId::new(state.next_id());
        state.products.insert(
            id,
            Product {
                id,
                category_id: None,
                category_name: None,
                name: name.to_owned(),
                description: None,
                price,
                stock,
                is_new: false,
                images: Vec::new(),
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Place a product in a category.
    pub fn categorize(&self, product: ProductId, category: CategoryId) {
        let mut state = self.lock();
        let name = state.categories.get(&category).map(|c| c.name.clone());
        if let Some(p) = state.products.get_mut(&product) {
            p.category_id = Some(category);
            p.category_name = name;
        }
    }

    /// Simulate an admin price edit.
    pub fn set_price(&self, product: ProductId, price: Decimal) {
        if let Some(p) = self.lock().products.get_mut(&product) {
            p.price = price;
        }
    }

    pub fn stock_of(&self, product: ProductId) -> Option<i32> {
        self.lock().products.get(&product).map(|p| p.stock)
    }

    pub fn set_setting(&self, key: &str, value: &str) {
        self.lock().settings.insert(
            key.to_owned(),
            Setting {
                key: key.to_owned(),
                value: value.to_owned(),
                updated_at: Utc::now(),
            },
        );
    }

    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.lock().products.get(&id).cloned())
    }

    async fn browse_products(&self, query: &ProductQuery) -> StoreResult<Page<Product>> {
        let state = self.lock();
        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut rows: Vec<Product> = state
            .products
            .values()
            .filter(|p| {
                needle
                    .as_deref()
                    .is_none_or(|n| p.name.to_lowercase().contains(n))
            })
            .filter(|p| query.category.is_none_or(|c| p.category_id == Some(c)))
            .filter(|p| query.max_price.is_none_or(|max| p.price <= max))
            .cloned()
            .collect();

        match query.sort {
            crate::models::ProductSort::Name => {
                rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            }
            crate::models::ProductSort::PriceLow => {
                rows.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id)));
            }
            crate::models::ProductSort::PriceHigh => {
                rows.sort_by(|a, b| b.price.cmp(&a.price).then(a.id.cmp(&b.id)));
            }
            crate::models::ProductSort::Newest => {
                rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            }
        }

        Ok(page_of(&rows, query.page))
    }

    async fn categories(&self) -> StoreResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.lock().categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn decrement_stock(&self, id: ProductId, quantity: i32) -> StoreResult<Option<i32>> {
        let mut state = self.lock();
        Ok(state
            .products
            .get_mut(&id)
            .filter(|p| p.stock >= quantity)
            .map(|p| {
                p.stock -= quantity;
                p.stock
            }))
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get_or_create_cart(&self, user_id: UserId) -> StoreResult<Cart> {
        let mut state = self.lock();
        if let Some(cart) = state.carts.values().find(|c| c.user_id == user_id) {
            return Ok(cart.clone());
        }
        let now = Utc::now();
        let cart = Cart {
            id: CartId::new(state.next_id()),
            user_id,
            created_at: now,
            updated_at: now,
        };
        state.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> StoreResult<Option<CartItem>> {
        Ok(self
            .lock()
            .cart_items
            .iter()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
            .cloned())
    }

    async fn cart_lines(&self, cart_id: CartId) -> StoreResult<Vec<CartLine>> {
        let state = self.lock();
        let mut items: Vec<&CartItem> = state
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .collect();
        items.sort_by_key(|i| i.id);

        Ok(items
            .into_iter()
            .filter_map(|item| {
                state.products.get(&item.product_id).map(|p| {
                    CartLine::new(
                        p.id,
                        p.name.clone(),
                        p.price,
                        p.stock,
                        p.images.first().cloned(),
                        item.quantity,
                    )
                })
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
        let mut state = self.lock();
        if !state.products.contains_key(&product_id) {
            return Err(RepositoryError::Conflict(format!(
                "product {product_id} does not exist"
            )));
        }

        let now = Utc::now();
        if let Some(item) = state
            .cart_items
            .iter_mut()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
        {
            if item.quantity + quantity > ceiling {
                return Ok(None);
            }
            item.quantity += quantity;
            item.updated_at = now;
            return Ok(Some(item.clone()));
        }

        if quantity > ceiling {
            return Ok(None);
        }
        let item = CartItem {
            id: CartItemId::new(state.next_id()),
            cart_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        };
        state.cart_items.push(item.clone());
        Ok(Some(item))
    }

    async fn set_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<Option<CartItem>> {
        let mut state = self.lock();
        Ok(state
            .cart_items
            .iter_mut()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
            .map(|item| {
                item.quantity = quantity;
                item.updated_at = Utc::now();
                item.clone()
            }))
    }

    async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> StoreResult<bool> {
        let mut state = self.lock();
        let before = state.cart_items.len();
        state
            .cart_items
            .retain(|i| !(i.cart_id == cart_id && i.product_id == product_id));
        Ok(state.cart_items.len() < before)
    }

    async fn clear_cart(&self, cart_id: CartId) -> StoreResult<u64> {
        let mut state = self.lock();
        let before = state.cart_items.len();
        state.cart_items.retain(|i| i.cart_id != cart_id);
        Ok((before - state.cart_items.len()) as u64)
    }

    async fn clear_cart_for_user(&self, user_id: UserId) -> StoreResult<u64> {
        let mut state = self.lock();
        let Some(cart_id) = state
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .map(|c| c.id)
        else {
            return Ok(0);
        };
        let before = state.cart_items.len();
        state.cart_items.retain(|i| i.cart_id != cart_id);
        Ok((before - state.cart_items.len()) as u64)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, order: &NewOrder) -> StoreResult<Order> {
        self.lock().insert_order(order)
    }

    async fn add_order_item(
        &self,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> StoreResult<OrderItem> {
        let mut state = self.lock();
        if !state.orders.contains_key(&order_id) {
            return Err(RepositoryError::NotFound);
        }
        state.insert_order_item(order_id, item)
    }

    async fn create_order_with_items(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> StoreResult<OrderDetails> {
        let mut state = self.lock();
        // Validate up front so a bad line leaves nothing behind.
        if let Some(missing) = items
            .iter()
            .find(|i| !state.products.contains_key(&i.product_id))
        {
            return Err(RepositoryError::Conflict(format!(
                "product {} does not exist",
                missing.product_id
            )));
        }

        let order = state.insert_order(order)?;
        let items = items
            .iter()
            .map(|item| state.insert_order_item(order.id, item))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(OrderDetails { order, items })
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn order_items(&self, id: OrderId) -> StoreResult<Vec<OrderItem>> {
        Ok(self
            .lock()
            .order_items
            .iter()
            .filter(|i| i.order_id == id)
            .cloned()
            .collect())
    }

    async fn orders_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> StoreResult<Page<Order>> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(page_of(&orders, page))
    }

    async fn all_orders(&self, page: PageRequest) -> StoreResult<Page<Order>> {
        let mut orders: Vec<Order> = self.lock().orders.values().cloned().collect();
        newest_first(&mut orders);
        Ok(page_of(&orders, page))
    }

    async fn order_statuses(&self) -> StoreResult<Vec<OrderStatusRow>> {
        Ok(self.lock().statuses.clone())
    }

    async fn transition_order(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> StoreResult<Option<Order>> {
        let mut state = self.lock();
        if !state.statuses.iter().any(|s| s.name == to.as_str()) {
            return Err(RepositoryError::Configuration(format!(
                "order status '{to}' is missing"
            )));
        }
        Ok(state
            .orders
            .get_mut(&id)
            .filter(|o| from.contains(&o.status))
            .map(|order| {
                order.status = to;
                order.updated_at = Utc::now();
                order.clone()
            }))
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(&self, transaction: &NewTransaction) -> StoreResult<Transaction> {
        let mut state = self.lock();
        if state
            .transactions
            .iter()
            .any(|t| t.reference == transaction.reference)
        {
            return Err(RepositoryError::Conflict(format!(
                "transaction reference {} already exists",
                transaction.reference
            )));
        }
        let now = Utc::now();
        let row = Transaction {
            id: TransactionId::new(state.next_id()),
            order_id: transaction.order_id,
            reference: transaction.reference.clone(),
            amount: transaction.amount,
            status: transaction.status,
            customer_email: transaction.customer_email.clone(),
            metadata: transaction.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        state.transactions.push(row.clone());
        Ok(row)
    }

    async fn transaction_by_reference(&self, reference: &str) -> StoreResult<Option<Transaction>> {
        Ok(self
            .lock()
            .transactions
            .iter()
            .find(|t| t.reference == reference)
            .cloned())
    }

    async fn latest_transaction_for_order(
        &self,
        order_id: OrderId,
    ) -> StoreResult<Option<Transaction>> {
        Ok(self
            .lock()
            .transactions
            .iter()
            .filter(|t| t.order_id == order_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn update_transaction_status(
        &self,
        reference: &str,
        from: &[TransactionStatus],
        status: TransactionStatus,
    ) -> StoreResult<Option<StatusChange>> {
        let mut state = self.lock();
        Ok(state
            .transactions
            .iter_mut()
            .find(|t| t.reference == reference)
            .filter(|row| from.contains(&row.status))
            .map(|row| {
                let previous = row.status;
                row.status = status;
                row.updated_at = Utc::now();
                StatusChange {
                    transaction: row.clone(),
                    previous,
                }
            }))
    }
}

#[async_trait]
impl AddressStore for MemoryStore {
    async fn addresses(&self, user_id: UserId) -> StoreResult<Vec<Address>> {
        let mut rows: Vec<Address> = self
            .lock()
            .addresses
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn address(&self, user_id: UserId, id: AddressId) -> StoreResult<Option<Address>> {
        Ok(self
            .lock()
            .addresses
            .iter()
            .find(|a| a.user_id == user_id && a.id == id)
            .cloned())
    }

    async fn count_addresses(&self, user_id: UserId) -> StoreResult<i64> {
        let count = self
            .lock()
            .addresses
            .iter()
            .filter(|a| a.user_id == user_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn create_address(&self, user_id: UserId, input: &AddressInput) -> StoreResult<Address> {
        let mut state = self.lock();
        if input.is_default {
            state.clear_defaults(user_id);
        }
        let now = Utc::now();
        let address = Address {
            id: AddressId::new(state.next_id()),
            user_id,
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            phone: input.phone.clone(),
            additional_phone: input.additional_phone.clone(),
            street: input.street.clone(),
            additional_info: input.additional_info.clone(),
            city: input.city.clone(),
            state: input.state.clone(),
            country: input.country.clone(),
            zip: input.zip.clone(),
            is_default: input.is_default,
            created_at: now,
            updated_at: now,
        };
        state.addresses.push(address.clone());
        Ok(address)
    }

    async fn update_address(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> StoreResult<Option<Address>> {
        let mut state = self.lock();
        if !state
            .addresses
            .iter()
            .any(|a| a.user_id == user_id && a.id == id)
        {
            return Ok(None);
        }
        if input.is_default {
            state.clear_defaults(user_id);
        }
        Ok(state
            .addresses
            .iter_mut()
            .find(|a| a.user_id == user_id && a.id == id)
            .map(|a| {
                a.first_name.clone_from(&input.first_name);
                a.last_name.clone_from(&input.last_name);
                a.phone.clone_from(&input.phone);
                a.additional_phone.clone_from(&input.additional_phone);
                a.street.clone_from(&input.street);
                a.additional_info.clone_from(&input.additional_info);
                a.city.clone_from(&input.city);
                a.state.clone_from(&input.state);
                a.country.clone_from(&input.country);
                a.zip.clone_from(&input.zip);
                a.is_default = input.is_default;
                a.updated_at = Utc::now();
                a.clone()
            }))
    }

    async fn delete_address(&self, user_id: UserId, id: AddressId) -> StoreResult<bool> {
        let mut state = self.lock();
        let before = state.addresses.len();
        state
            .addresses
            .retain(|a| !(a.user_id == user_id && a.id == id));
        Ok(state.addresses.len() < before)
    }

    async fn set_default_address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> StoreResult<Option<Address>> {
        let mut state = self.lock();
        if !state
            .addresses
            .iter()
            .any(|a| a.user_id == user_id && a.id == id)
        {
            return Ok(None);
        }
        state.clear_defaults(user_id);
        Ok(state
            .addresses
            .iter_mut()
            .find(|a| a.user_id == user_id && a.id == id)
            .map(|a| {
                a.is_default = true;
                a.updated_at = Utc::now();
                a.clone()
            }))
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn settings(&self) -> StoreResult<Vec<Setting>> {
        Ok(self.lock().settings.values().cloned().collect())
    }

    async fn setting(&self, key: &str) -> StoreResult<Option<Setting>> {
        Ok(self.lock().settings.get(key).cloned())
    }

    async fn update_setting(&self, key: &str, value: &str) -> StoreResult<Option<Setting>> {
        let mut state = self.lock();
        Ok(state.settings.get_mut(key).map(|s| {
            value.clone_into(&mut s.value);
            s.updated_at = Utc::now();
            s.clone()
        }))
    }
}
