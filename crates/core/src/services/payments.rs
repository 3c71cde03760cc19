//! Payment reconciliation.
//!
//! [`PaymentService::reconcile`] is the only code path that moves an order
//! from `pending` to `paid`, and the only caller of the stock decrement.
//! The buyer's verify poll, the provider webhook and the admin "reconcile"
//! button all go through it.
//!
//! Two guards make repeated signals converge:
//! - the transaction status write returns the status it replaced, so a
//!   replay sees that the attempt was already settled;
//! - the `pending -> paid` move is a compare-and-set, so of two racing
//!   reconciliations exactly one wins the edge and runs fulfillment.

use core::fmt;

use serde::Serialize;
use tracing::instrument;

use crate::error::{ShopError, ShopResult};
use crate::gateway::{
    GatewayError, GatewayVerification, InitializedPayment, PaymentGateway, PaymentInit,
    is_valid_reference, new_reference,
};
use crate::models::{NewTransaction, Order, StockAdjustment, Transaction};
use crate::store::ShopStore;
use crate::types::{
    Email, GatewayStatus, OrderId, OrderStatus, TransactionStatus, UserId, to_minor_units,
};
use crate::webhook::WebhookEvent;

/// The buyer starting a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buyer {
    pub id: UserId,
    pub email: Email,
}

/// Where a payment signal came from. Used for logging only; every source
/// is reconciled identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Poll,
    Webhook,
    Admin,
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Poll => "poll",
            Self::Webhook => "webhook",
            Self::Admin => "admin",
        })
    }
}

/// A "this reference may have been paid" signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSignal {
    pub reference: String,
    /// Order the caller believes the reference belongs to. Used to create
    /// the transaction row if it is missing and to reject references that
    /// belong to a different order.
    pub order_hint: Option<OrderId>,
    pub customer_email: Option<String>,
    pub source: SignalSource,
}

impl PaymentSignal {
    #[must_use]
    pub fn poll(reference: impl Into<String>, order_id: OrderId, email: &Email) -> Self {
        Self {
            reference: reference.into(),
            order_hint: Some(order_id),
            customer_email: Some(email.to_string()),
            source: SignalSource::Poll,
        }
    }

    #[must_use]
    pub fn admin(reference: impl Into<String>, order_id: OrderId) -> Self {
        Self {
            reference: reference.into(),
            order_hint: Some(order_id),
            customer_email: None,
            source: SignalSource::Admin,
        }
    }
}

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// This call moved the order to `paid` and ran fulfillment.
    Paid {
        order: Order,
        stock: Vec<StockAdjustment>,
    },
    /// Payment was confirmed earlier; nothing was repeated.
    AlreadySettled { order: Order },
    Cancelled { order: Order },
    Reversed { order: Order },
    /// The gateway still reports the attempt as in flight.
    Pending,
    /// The gateway could not be reached in time. Nothing was written;
    /// retry later.
    VerificationUnavailable,
    /// The gateway says paid but the order cannot follow (amount mismatch,
    /// or the order was cancelled meanwhile). Logged for manual follow-up.
    NeedsAttention { order: Order, reason: String },
}

/// What a webhook event did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Reconciled(ReconcileOutcome),
    StatusChanged { order: Order },
    Unchanged { order: Order },
    Ignored { event: String },
}

pub struct PaymentService<'a, S, G> {
    store: &'a S,
    gateway: &'a G,
}

impl<'a, S: ShopStore, G: PaymentGateway> PaymentService<'a, S, G> {
    pub const fn new(store: &'a S, gateway: &'a G) -> Self {
        Self { store, gateway }
    }

    /// Start a payment for one of the buyer's pending orders.
    ///
    /// The amount always comes from the stored order total. A `pending`
    /// transaction row is written before the gateway is called, so every
    /// later confirmation has a row to update.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or foreign orders, `Conflict` if the order is
    /// not pending, `Upstream` if the gateway refuses.
    #[instrument(skip(self, buyer), fields(user_id = %buyer.id))]
    pub async fn initialize_payment(
        &self,
        buyer: &Buyer,
        order_id: OrderId,
    ) -> ShopResult<InitializedPayment> {
        let order = self
            .store
            .order(order_id)
            .await?
            .filter(|o| o.user_id == buyer.id)
            .ok_or_else(|| ShopError::not_found("Order"))?;
        if order.status != OrderStatus::Pending {
            return Err(ShopError::Conflict(
                "Order is not awaiting payment".to_owned(),
            ));
        }

        let amount_minor = to_minor_units(order.total_amount)
            .filter(|amount| *amount > 0)
            .ok_or_else(|| ShopError::Validation("Order total must be positive".to_owned()))?;

        let reference = new_reference();
        let metadata = serde_json::json!({
            "order_id": order.id,
            "user_id": buyer.id,
        });

        self.store
            .insert_transaction(&NewTransaction {
                order_id: order.id,
                reference: reference.clone(),
                amount: order.total_amount,
                status: TransactionStatus::Pending,
                customer_email: buyer.email.to_string(),
                metadata: metadata.clone(),
            })
            .await?;

        let request = PaymentInit {
            email: buyer.email.clone(),
            amount_minor,
            reference: reference.clone(),
            metadata,
        };
        let initialized = match self.gateway.initialize(&request).await {
            Ok(init) if init.reference == reference => init,
            Ok(init) => {
                tracing::error!(
                    expected = %reference,
                    returned = %init.reference,
                    "Gateway returned a different reference"
                );
                self.abandon_attempt(&reference).await;
                return Err(ShopError::Upstream(
                    "Payment gateway returned an unexpected reference".to_owned(),
                ));
            }
            Err(e) => {
                tracing::error!(reference = %reference, error = %e, "Payment initialization failed");
                self.abandon_attempt(&reference).await;
                return Err(ShopError::Upstream(e.to_string()));
            }
        };

        tracing::info!(
            order_id = %order.id,
            reference = %reference,
            amount_minor,
            "Payment initialized"
        );
        Ok(initialized)
    }

    /// Reconcile one reference against the gateway.
    ///
    /// 1. Find the transaction, creating a `pending` row from the order hint
    ///    if it is missing.
    /// 2. Verify with the gateway. A timeout ends here with
    ///    [`ReconcileOutcome::VerificationUnavailable`].
    /// 3. Store the gateway's status.
    /// 4. On success, unless already settled, move the order
    ///    `pending -> paid` and decrement stock for each line.
    /// 5. On failure, cancel a pending order. Stock is untouched.
    /// 6. Clear the buyer's cart after a successful `paid` move
    ///    (best-effort).
    ///
    /// # Errors
    ///
    /// `Validation` for malformed references, `NotFound` for an unknown
    /// reference without an order hint, `Conflict` for a reference that
    /// belongs to another order, `Upstream` for non-timeout gateway errors.
    #[instrument(skip(self, signal), fields(reference = %signal.reference, source = %signal.source))]
    pub async fn reconcile(&self, signal: &PaymentSignal) -> ShopResult<ReconcileOutcome> {
        if !is_valid_reference(&signal.reference) {
            return Err(ShopError::Validation("Invalid payment reference".to_owned()));
        }

        let transaction = self.ensure_transaction(signal).await?;

        let verification = match self.gateway.verify(&signal.reference).await {
            Ok(v) => v,
            Err(GatewayError::Timeout) => {
                tracing::warn!("Gateway verification timed out; leaving payment state untouched");
                return Ok(ReconcileOutcome::VerificationUnavailable);
            }
            Err(e) => {
                tracing::error!(error = %e, "Gateway verification failed");
                return Err(ShopError::Upstream(e.to_string()));
            }
        };

        let order = self
            .store
            .order(transaction.order_id)
            .await?
            .ok_or_else(|| ShopError::not_found("Order"))?;

        match verification.status {
            GatewayStatus::Success => self.settle(&transaction, order, &verification).await,
            GatewayStatus::Failed | GatewayStatus::Abandoned => {
                self.cancel(&transaction, order, &verification).await
            }
            GatewayStatus::Reversed => self.reverse(&transaction, order).await,
            GatewayStatus::Pending => {
                tracing::info!(
                    gateway_response = ?verification.gateway_response,
                    "Payment still in progress"
                );
                Ok(ReconcileOutcome::Pending)
            }
        }
    }

    /// Apply a verified webhook event.
    ///
    /// Charge outcomes are re-confirmed through [`Self::reconcile`].
    /// Dispute, refund and reversal events follow the fixed table in
    /// [`crate::webhook::EventKind::effect`] and never touch stock.
    ///
    /// # Errors
    ///
    /// `Validation` when the event carries no reference, `NotFound` for an
    /// unknown reference, plus anything [`Self::reconcile`] returns.
    #[instrument(skip(self, event), fields(event = %event.event))]
    pub async fn apply_webhook(&self, event: &WebhookEvent) -> ShopResult<WebhookOutcome> {
        let kind = event.kind();
        if kind == crate::webhook::EventKind::Unknown {
            tracing::info!("Ignoring unhandled webhook event");
            return Ok(WebhookOutcome::Ignored {
                event: event.event.clone(),
            });
        }

        let reference = event
            .reference()
            .ok_or_else(|| ShopError::Validation("Webhook event has no reference".to_owned()))?;

        if kind.needs_verification() {
            let signal = PaymentSignal {
                reference: reference.to_owned(),
                order_hint: event.order_hint(),
                customer_email: None,
                source: SignalSource::Webhook,
            };
            return Ok(WebhookOutcome::Reconciled(self.reconcile(&signal).await?));
        }

        let Some(effect) = kind.effect() else {
            return Ok(WebhookOutcome::Ignored {
                event: event.event.clone(),
            });
        };

        let transaction = self
            .store
            .transaction_by_reference(reference)
            .await?
            .ok_or_else(|| ShopError::not_found("Transaction"))?;

        let order = self
            .store
            .order(transaction.order_id)
            .await?
            .ok_or_else(|| ShopError::not_found("Order"))?;
        if order.status == effect.order {
            return Ok(WebhookOutcome::Unchanged { order });
        }

        match self
            .store
            .transition_order(order.id, effect.from, effect.order)
            .await?
        {
            Some(updated) => {
                if let Some(status) = effect.transaction {
                    self.store
                        .update_transaction_status(reference, &TransactionStatus::ALL, status)
                        .await?;
                }
                tracing::info!(
                    order_id = %updated.id,
                    from = %order.status,
                    to = %updated.status,
                    "Order status updated from webhook"
                );
                Ok(WebhookOutcome::StatusChanged { order: updated })
            }
            None => {
                tracing::warn!(
                    order_id = %order.id,
                    status = %order.status,
                    target = %effect.order,
                    "Webhook transition not allowed from current order status"
                );
                Ok(WebhookOutcome::Unchanged { order })
            }
        }
    }

    async fn ensure_transaction(&self, signal: &PaymentSignal) -> ShopResult<Transaction> {
        if let Some(existing) = self
            .store
            .transaction_by_reference(&signal.reference)
            .await?
        {
            if let Some(hint) = signal.order_hint
                && hint != existing.order_id
            {
                return Err(ShopError::Conflict(
                    "Payment reference belongs to another order".to_owned(),
                ));
            }
            return Ok(existing);
        }

        let order_id = signal
            .order_hint
            .ok_or_else(|| ShopError::not_found("Transaction"))?;
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| ShopError::not_found("Order"))?;

        tracing::warn!(order_id = %order.id, "No transaction row for reference; recording one");
        let created = self
            .store
            .insert_transaction(&NewTransaction {
                order_id: order.id,
                reference: signal.reference.clone(),
                amount: order.total_amount,
                status: TransactionStatus::Pending,
                customer_email: signal.customer_email.clone().unwrap_or_default(),
                metadata: serde_json::json!({
                    "order_id": order.id,
                    "user_id": order.user_id,
                    "recorded_by": signal.source,
                }),
            })
            .await;

        match created {
            Ok(row) => Ok(row),
            // Another signal for the same reference inserted it first.
            Err(crate::error::RepositoryError::Conflict(_)) => self
                .store
                .transaction_by_reference(&signal.reference)
                .await?
                .ok_or_else(|| ShopError::not_found("Transaction")),
            Err(e) => Err(e.into()),
        }
    }

    async fn settle(
        &self,
        transaction: &Transaction,
        order: Order,
        verification: &GatewayVerification,
    ) -> ShopResult<ReconcileOutcome> {
        let expected = to_minor_units(transaction.amount)
            .ok_or_else(|| ShopError::Internal("Transaction amount out of range".to_owned()))?;
        if verification.amount_minor != expected {
            tracing::error!(
                order_id = %order.id,
                expected_minor = expected,
                reported_minor = verification.amount_minor,
                "Gateway amount does not match transaction; order not advanced, manual reconciliation required"
            );
            return Ok(ReconcileOutcome::NeedsAttention {
                order,
                reason: "amount_mismatch".to_owned(),
            });
        }

        let recorded = self
            .store
            .update_transaction_status(
                &transaction.reference,
                TransactionStatus::UNSETTLED,
                TransactionStatus::Success,
            )
            .await?;

        if recorded.is_none() {
            // Already success, or moved on to a dispute, refund or reversal.
            // The stored status stays as it is.
            let current = self
                .store
                .transaction_by_reference(&transaction.reference)
                .await?
                .ok_or_else(|| ShopError::not_found("Transaction"))?;
            if order.status != OrderStatus::Pending || current.status != TransactionStatus::Success
            {
                tracing::info!(
                    order_id = %order.id,
                    status = %order.status,
                    transaction_status = %current.status,
                    "Payment already settled"
                );
                return Ok(ReconcileOutcome::AlreadySettled { order });
            }
            // A previous run stored success but never reached the order.
            tracing::warn!(order_id = %order.id, "Settled transaction on a pending order; completing fulfillment");
        }

        let Some(paid) = self
            .store
            .transition_order(order.id, &[OrderStatus::Pending], OrderStatus::Paid)
            .await?
        else {
            return self.lost_paid_race(order.id).await;
        };

        let stock = self.fulfil(&paid).await?;
        self.clear_cart(&paid).await;

        tracing::info!(order_id = %paid.id, lines = stock.len(), "Order paid");
        Ok(ReconcileOutcome::Paid { order: paid, stock })
    }

    /// The `pending -> paid` compare-and-set matched nothing.
    async fn lost_paid_race(&self, order_id: OrderId) -> ShopResult<ReconcileOutcome> {
        let current = self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| ShopError::not_found("Order"))?;

        if current.status == OrderStatus::Cancelled {
            tracing::error!(
                order_id = %current.id,
                "Payment succeeded for a cancelled order; manual reconciliation required"
            );
            return Ok(ReconcileOutcome::NeedsAttention {
                order: current,
                reason: "paid_after_cancel".to_owned(),
            });
        }

        tracing::info!(order_id = %current.id, status = %current.status, "Order already advanced by another signal");
        Ok(ReconcileOutcome::AlreadySettled { order: current })
    }

    /// Conditional decrement for each order line. A line that no longer fits
    /// is logged and skipped: payment has already been taken, so the order
    /// must not be left half-fulfilled.
    async fn fulfil(&self, order: &Order) -> ShopResult<Vec<StockAdjustment>> {
        let items = self.store.order_items(order.id).await?;
        let mut adjustments = Vec::with_capacity(items.len());

        for item in items {
            let remaining = match self
                .store
                .decrement_stock(item.product_id, item.quantity)
                .await
            {
                Ok(Some(remaining)) => Some(remaining),
                Ok(None) => {
                    tracing::warn!(
                        order_id = %order.id,
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        "Insufficient stock for paid order line; decrement skipped"
                    );
                    None
                }
                Err(e) => {
                    tracing::error!(
                        order_id = %order.id,
                        product_id = %item.product_id,
                        error = %e,
                        "Stock decrement failed for paid order line"
                    );
                    None
                }
            };
            adjustments.push(StockAdjustment {
                product_id: item.product_id,
                quantity: item.quantity,
                remaining,
            });
        }

        Ok(adjustments)
    }

    async fn clear_cart(&self, order: &Order) {
        if let Err(e) = self.store.clear_cart_for_user(order.user_id).await {
            tracing::warn!(order_id = %order.id, error = %e, "Failed to clear cart after payment");
        }
    }

    async fn cancel(
        &self,
        transaction: &Transaction,
        order: Order,
        verification: &GatewayVerification,
    ) -> ShopResult<ReconcileOutcome> {
        let recorded = self
            .store
            .update_transaction_status(
                &transaction.reference,
                TransactionStatus::UNSETTLED,
                verification.status.transaction_status(),
            )
            .await?;
        if recorded.is_none() {
            tracing::warn!(
                reference = %transaction.reference,
                "Gateway reports failure for a settled transaction; stored status kept"
            );
        }

        tracing::info!(
            order_id = %order.id,
            gateway_response = ?verification.gateway_response,
            "Payment was not successful"
        );

        match self
            .store
            .transition_order(order.id, &[OrderStatus::Pending], OrderStatus::Cancelled)
            .await?
        {
            Some(cancelled) => Ok(ReconcileOutcome::Cancelled { order: cancelled }),
            None if order.status == OrderStatus::Cancelled => {
                Ok(ReconcileOutcome::Cancelled { order })
            }
            None => {
                let current = self
                    .store
                    .order(order.id)
                    .await?
                    .ok_or_else(|| ShopError::not_found("Order"))?;
                if current.status == OrderStatus::Cancelled {
                    Ok(ReconcileOutcome::Cancelled { order: current })
                } else {
                    Ok(ReconcileOutcome::AlreadySettled { order: current })
                }
            }
        }
    }

    async fn reverse(&self, transaction: &Transaction, order: Order) -> ShopResult<ReconcileOutcome> {
        self.store
            .update_transaction_status(
                &transaction.reference,
                &[
                    TransactionStatus::Pending,
                    TransactionStatus::Success,
                    TransactionStatus::Failed,
                    TransactionStatus::Disputed,
                ],
                TransactionStatus::Reversed,
            )
            .await?;

        let from = [
            OrderStatus::Paid,
            OrderStatus::RefundPending,
            OrderStatus::Disputed,
        ];
        let order = self
            .store
            .transition_order(order.id, &from, OrderStatus::Refunded)
            .await?
            .unwrap_or(order);
        tracing::info!(order_id = %order.id, status = %order.status, "Payment reversed");
        Ok(ReconcileOutcome::Reversed { order })
    }

    async fn abandon_attempt(&self, reference: &str) {
        if let Err(e) = self
            .store
            .update_transaction_status(
                reference,
                &[TransactionStatus::Pending],
                TransactionStatus::Failed,
            )
            .await
        {
            tracing::warn!(reference, error = %e, "Failed to mark abandoned payment attempt");
        }
    }
}
