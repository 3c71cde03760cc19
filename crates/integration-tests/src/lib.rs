//! End-to-end tests for the Texos cart-to-paid-order pipeline.
//!
//! The tests drive the real engines from `texos-core` against the
//! in-memory store and a [`ScriptedGateway`], so they need no database,
//! network or running server.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p texos-integration-tests
//!
//! # With engine logs
//! RUST_LOG=texos_core=debug cargo test -p texos-integration-tests -- --nocapture
//! ```
//!
//! # Test Files
//!
//! - `cart_checkout` - Stock ceilings, guest merge, totals, price stability
//! - `payments` - Poll/webhook/admin reconciliation and idempotency
//! - `webhooks` - Signature checks and the dispute/refund event table
//! - `addresses` - Default-address switching
//! - `stock` - Concurrent conditional decrements

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod gateway;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;

use texos_core::models::{AddressInput, CartItem, OrderDetails};
use texos_core::services::{
    AddressBook, Buyer, CartService, OrderService, PaymentService, PaymentSignal,
    ReconcileOutcome, WebhookOutcome,
};
use texos_core::store::MemoryStore;
use texos_core::webhook::{self, WebhookEvent};
use texos_core::{Email, OrderId, ProductId, ShopResult, UserId};

pub use gateway::{ScriptedGateway, Verdict};

/// The buyer most tests act as.
pub const BUYER_ID: UserId = UserId::new(7);

/// A second buyer, for ownership and contention tests.
pub const OTHER_BUYER_ID: UserId = UserId::new(8);

/// Shared secret the harness signs webhook bodies with.
pub const WEBHOOK_SECRET: &[u8] = b"sk_test_4f1c9a7e2b8d0c6f3a5e9b1d7c2f8a4e";

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One shop: an in-memory store and a scripted gateway.
///
/// Cloning shares both, so clones can be moved into spawned tasks to race
/// against each other.
#[derive(Debug, Clone)]
pub struct Shop {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
}

impl Default for Shop {
    fn default() -> Self {
        Self::new()
    }
}

impl Shop {
    #[must_use]
    pub fn new() -> Self {
        init_tracing();
        Self {
            store: Arc::new(MemoryStore::new()),
            gateway: Arc::new(ScriptedGateway::new()),
        }
    }

    /// Add a product priced in whole naira.
    #[must_use]
    pub fn product(&self, name: &str, naira: i64, stock: i32) -> ProductId {
        self.store.add_product(name, Decimal::from(naira), stock)
    }

    #[must_use]
    pub fn stock(&self, product: ProductId) -> Option<i32> {
        self.store.stock_of(product)
    }

    #[must_use]
    pub fn cart(&self) -> CartService<'_, MemoryStore> {
        CartService::new(&*self.store)
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_, MemoryStore> {
        OrderService::new(&*self.store)
    }

    #[must_use]
    pub fn payments(&self) -> PaymentService<'_, MemoryStore, ScriptedGateway> {
        PaymentService::new(&*self.store, &*self.gateway)
    }

    #[must_use]
    pub fn addresses(&self) -> AddressBook<'_, MemoryStore> {
        AddressBook::new(&*self.store)
    }

    /// Add to the user's server cart, creating it on first use.
    ///
    /// # Errors
    ///
    /// Whatever [`CartService::add_item`] returns.
    pub async fn add_to_cart(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> ShopResult<CartItem> {
        let cart = self.cart().get_or_create_cart(user).await?;
        self.cart().add_item(cart.id, product, quantity).await
    }

    /// Quantity of `product` in the user's cart (0 if absent).
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn quantity_in_cart(&self, user: UserId, product: ProductId) -> ShopResult<i32> {
        let view = self.cart().view(user).await?;
        Ok(view
            .items
            .iter()
            .find(|line| line.product_id == product)
            .map_or(0, |line| line.quantity))
    }

    /// Fill the cart with `lines` and check out without an address.
    ///
    /// # Errors
    ///
    /// Any cart or checkout error.
    pub async fn place_order(
        &self,
        user: UserId,
        lines: &[(ProductId, i32)],
    ) -> ShopResult<OrderDetails> {
        for &(product, quantity) in lines {
            self.add_to_cart(user, product, quantity).await?;
        }
        self.orders().checkout(user, None).await
    }

    /// Initialize a payment for `order` as `user` and return the reference.
    ///
    /// # Errors
    ///
    /// Whatever [`PaymentService::initialize_payment`] returns.
    pub async fn start_payment(&self, user: UserId, order: OrderId) -> ShopResult<String> {
        let init = self
            .payments()
            .initialize_payment(&buyer(user), order)
            .await?;
        Ok(init.reference)
    }

    /// The buyer's verify poll.
    ///
    /// # Errors
    ///
    /// Whatever [`PaymentService::reconcile`] returns.
    pub async fn poll(
        &self,
        user: UserId,
        reference: &str,
        order: OrderId,
    ) -> ShopResult<ReconcileOutcome> {
        self.payments()
            .reconcile(&PaymentSignal::poll(reference, order, &buyer(user).email))
            .await
    }

    /// The admin "reconcile" action.
    ///
    /// # Errors
    ///
    /// Whatever [`PaymentService::reconcile`] returns.
    pub async fn admin_reconcile(
        &self,
        reference: &str,
        order: OrderId,
    ) -> ShopResult<ReconcileOutcome> {
        self.payments()
            .reconcile(&PaymentSignal::admin(reference, order))
            .await
    }

    /// Deliver a webhook the way the storefront handler does: sign the raw
    /// body, verify the signature, parse, apply.
    ///
    /// # Errors
    ///
    /// Whatever [`PaymentService::apply_webhook`] returns.
    ///
    /// # Panics
    ///
    /// If the harness's own signature does not verify.
    pub async fn deliver_webhook(&self, payload: &serde_json::Value) -> ShopResult<WebhookOutcome> {
        let body = payload.to_string().into_bytes();
        let signature = webhook::sign(WEBHOOK_SECRET, &body).expect("sign webhook body");
        webhook::verify_signature(WEBHOOK_SECRET, &body, &signature)
            .expect("harness signature verifies");
        let event = WebhookEvent::parse(&body).expect("harness payload parses");
        self.payments().apply_webhook(&event).await
    }
}

#[must_use]
pub fn buyer(user: UserId) -> Buyer {
    Buyer {
        id: user,
        email: Email::parse(&format!("buyer{user}@example.com")).expect("fixture email"),
    }
}

/// `charge.*` payload with the order id in the metadata, as the gateway
/// echoes it back.
#[must_use]
pub fn charge_event(event: &str, reference: &str, order: OrderId) -> serde_json::Value {
    json!({
        "event": event,
        "data": {
            "reference": reference,
            "status": event.trim_start_matches("charge."),
            "metadata": { "order_id": order.as_i32() },
        }
    })
}

/// Dispute and refund payloads nest the charge under `transaction`.
#[must_use]
pub fn nested_event(event: &str, reference: &str) -> serde_json::Value {
    json!({
        "event": event,
        "data": {
            "transaction": { "reference": reference },
        }
    })
}

#[must_use]
pub fn address_input(street: &str, is_default: bool) -> AddressInput {
    AddressInput {
        first_name: "Ada".into(),
        last_name: "Obi".into(),
        phone: "08012345678".into(),
        street: street.into(),
        city: "Lagos".into(),
        state: "Lagos".into(),
        country: "Nigeria".into(),
        is_default,
        ..AddressInput::default()
    }
}
