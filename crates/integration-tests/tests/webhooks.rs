//! Webhook signatures and the dispute/refund event table.

#![allow(clippy::unwrap_used)]

use serde_json::json;

use texos_core::services::{ReconcileOutcome, WebhookOutcome};
use texos_core::store::TransactionStore;
use texos_core::webhook::{self, WebhookError, WebhookEvent};
use texos_core::{ErrorKind, OrderId, OrderStatus, ProductId, TransactionStatus};
use texos_integration_tests::{
    BUYER_ID, Shop, Verdict, WEBHOOK_SECRET, charge_event, nested_event,
};

/// A paid order for three pieces of a product with stock 10.
async fn paid_order(shop: &Shop) -> (OrderId, String, ProductId) {
    let product = shop.product("Indigo Swirl Ankara", 18_500, 10);
    let details = shop.place_order(BUYER_ID, &[(product, 3)]).await.unwrap();
    let reference = shop.start_payment(BUYER_ID, details.order.id).await.unwrap();
    shop.gateway.script(&reference, Verdict::Success);
    let outcome = shop
        .poll(BUYER_ID, &reference, details.order.id)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Paid { .. }));
    (details.order.id, reference, product)
}

async fn order_status(shop: &Shop, order: OrderId) -> OrderStatus {
    shop.orders().get_order(order).await.unwrap().order.status
}

async fn transaction_status(shop: &Shop, reference: &str) -> TransactionStatus {
    shop.store
        .transaction_by_reference(reference)
        .await
        .unwrap()
        .unwrap()
        .status
}

// ============================================================================
// Signatures
// ============================================================================

#[test]
fn test_tampered_body_fails_signature() {
    let body = br#"{"event":"charge.success","data":{"reference":"TXabc"}}"#;
    let signature = webhook::sign(WEBHOOK_SECRET, body).unwrap();
    assert!(webhook::verify_signature(WEBHOOK_SECRET, body, &signature).is_ok());

    let tampered = br#"{"event":"charge.success","data":{"reference":"TXabd"}}"#;
    assert_eq!(
        webhook::verify_signature(WEBHOOK_SECRET, tampered, &signature),
        Err(WebhookError::InvalidSignature)
    );
    assert_eq!(
        webhook::verify_signature(b"sk_test_some_other_secret", body, &signature),
        Err(WebhookError::InvalidSignature)
    );
    assert_eq!(
        webhook::verify_signature(WEBHOOK_SECRET, body, ""),
        Err(WebhookError::MissingSignature)
    );
}

#[test]
fn test_body_without_event_is_malformed() {
    assert!(matches!(
        WebhookEvent::parse(br#"{"data":{}}"#),
        Err(WebhookError::Malformed(_))
    ));
    assert!(matches!(
        WebhookEvent::parse(b"not json"),
        Err(WebhookError::Malformed(_))
    ));
}

// ============================================================================
// Charge events
// ============================================================================

#[tokio::test]
async fn test_charge_failed_is_reconfirmed_with_the_gateway() {
    let shop = Shop::new();
    let product = shop.product("Sunburst Ankara", 16_000, 5);
    let details = shop.place_order(BUYER_ID, &[(product, 1)]).await.unwrap();
    let reference = shop.start_payment(BUYER_ID, details.order.id).await.unwrap();

    // The webhook claims failure but the gateway still has it in flight.
    let outcome = shop
        .deliver_webhook(&charge_event("charge.failed", &reference, details.order.id))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Reconciled(ReconcileOutcome::Pending));
    assert_eq!(order_status(&shop, details.order.id).await, OrderStatus::Pending);

    shop.gateway.script(&reference, Verdict::Failed);
    shop.deliver_webhook(&charge_event("charge.failed", &reference, details.order.id))
        .await
        .unwrap();
    assert_eq!(
        order_status(&shop, details.order.id).await,
        OrderStatus::Cancelled
    );
    assert_eq!(shop.stock(product), Some(5));
}

#[tokio::test]
async fn test_charge_success_with_metadata_as_string() {
    let shop = Shop::new();
    let product = shop.product("Sunburst Ankara", 16_000, 5);
    let details = shop.place_order(BUYER_ID, &[(product, 1)]).await.unwrap();
    let reference = "T139421103294154";
    shop.gateway
        .script_with_amount(reference, Verdict::Success, 1_600_000);

    let payload = json!({
        "event": "charge.success",
        "data": {
            "reference": reference,
            "metadata": format!("{{\"order_id\":\"{}\"}}", details.order.id),
        }
    });
    let outcome = shop.deliver_webhook(&payload).await.unwrap();
    assert!(matches!(
        outcome,
        WebhookOutcome::Reconciled(ReconcileOutcome::Paid { .. })
    ));
    assert_eq!(shop.stock(product), Some(4));
}

#[tokio::test]
async fn test_unknown_reference_without_hint_is_not_found() {
    let shop = Shop::new();
    let payload = json!({
        "event": "charge.success",
        "data": { "reference": "TXnobodyknows" }
    });

    let err = shop.deliver_webhook(&payload).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unhandled_event_is_ignored() {
    let shop = Shop::new();
    let outcome = shop
        .deliver_webhook(&json!({ "event": "transfer.success", "data": {} }))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Ignored {
            event: "transfer.success".to_owned()
        }
    );
}

#[tokio::test]
async fn test_handled_event_without_reference_is_a_validation_error() {
    let shop = Shop::new();
    let err = shop
        .deliver_webhook(&json!({ "event": "refund.processed", "data": {} }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ============================================================================
// Disputes and refunds never touch stock
// ============================================================================

#[tokio::test]
async fn test_dispute_opened_and_resolved() {
    let shop = Shop::new();
    let (order, reference, product) = paid_order(&shop).await;
    assert_eq!(shop.stock(product), Some(7));

    let outcome = shop
        .deliver_webhook(&nested_event("charge.dispute.create", &reference))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        WebhookOutcome::StatusChanged { ref order } if order.status == OrderStatus::Disputed
    ));
    assert_eq!(
        transaction_status(&shop, &reference).await,
        TransactionStatus::Disputed
    );

    // A reminder for an already disputed order changes nothing.
    let outcome = shop
        .deliver_webhook(&nested_event("charge.dispute.remind", &reference))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Unchanged { .. }));

    shop.deliver_webhook(&nested_event("charge.dispute.resolve", &reference))
        .await
        .unwrap();
    assert_eq!(order_status(&shop, order).await, OrderStatus::Paid);
    assert_eq!(
        transaction_status(&shop, &reference).await,
        TransactionStatus::Success
    );
    assert_eq!(shop.stock(product), Some(7));

    // A success replay after the dispute still does not re-fulfil.
    let replay = shop
        .deliver_webhook(&charge_event("charge.success", &reference, order))
        .await
        .unwrap();
    assert!(matches!(
        replay,
        WebhookOutcome::Reconciled(ReconcileOutcome::AlreadySettled { .. })
    ));
    assert_eq!(shop.stock(product), Some(7));
}

#[tokio::test]
async fn test_refund_lifecycle() {
    let shop = Shop::new();
    let (order, reference, product) = paid_order(&shop).await;

    shop.deliver_webhook(&nested_event("refund.pending", &reference))
        .await
        .unwrap();
    assert_eq!(order_status(&shop, order).await, OrderStatus::RefundPending);

    shop.deliver_webhook(&nested_event("refund.processed", &reference))
        .await
        .unwrap();
    assert_eq!(order_status(&shop, order).await, OrderStatus::Refunded);
    assert_eq!(
        transaction_status(&shop, &reference).await,
        TransactionStatus::Refunded
    );
    assert_eq!(shop.stock(product), Some(7));
}

#[tokio::test]
async fn test_failed_refund_returns_order_to_paid() {
    let shop = Shop::new();
    let (order, reference, _) = paid_order(&shop).await;

    shop.deliver_webhook(&nested_event("refund.pending", &reference))
        .await
        .unwrap();
    shop.deliver_webhook(&nested_event("refund.failed", &reference))
        .await
        .unwrap();
    assert_eq!(order_status(&shop, order).await, OrderStatus::Paid);
    assert_eq!(
        transaction_status(&shop, &reference).await,
        TransactionStatus::Success
    );
}

#[tokio::test]
async fn test_dispute_on_pending_order_is_refused() {
    let shop = Shop::new();
    let product = shop.product("Sunburst Ankara", 16_000, 5);
    let details = shop.place_order(BUYER_ID, &[(product, 1)]).await.unwrap();
    let reference = shop.start_payment(BUYER_ID, details.order.id).await.unwrap();

    let outcome = shop
        .deliver_webhook(&nested_event("charge.dispute.create", &reference))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        WebhookOutcome::Unchanged { ref order } if order.status == OrderStatus::Pending
    ));
    assert_eq!(
        transaction_status(&shop, &reference).await,
        TransactionStatus::Pending
    );
}

// ============================================================================
// Late charge signals never rewrite a settled transaction
// ============================================================================

#[tokio::test]
async fn test_success_replay_after_dispute_keeps_the_stored_status() {
    let shop = Shop::new();
    let (order, reference, product) = paid_order(&shop).await;
    shop.deliver_webhook(&nested_event("charge.dispute.create", &reference))
        .await
        .unwrap();

    let replay = shop
        .deliver_webhook(&charge_event("charge.success", &reference, order))
        .await
        .unwrap();
    assert!(matches!(
        replay,
        WebhookOutcome::Reconciled(ReconcileOutcome::AlreadySettled { .. })
    ));
    assert_eq!(order_status(&shop, order).await, OrderStatus::Disputed);
    assert_eq!(
        transaction_status(&shop, &reference).await,
        TransactionStatus::Disputed
    );
    assert_eq!(shop.stock(product), Some(7));
}

#[tokio::test]
async fn test_success_poll_after_refund_keeps_the_stored_status() {
    let shop = Shop::new();
    let (order, reference, product) = paid_order(&shop).await;
    shop.deliver_webhook(&nested_event("refund.processed", &reference))
        .await
        .unwrap();

    let outcome = shop.poll(BUYER_ID, &reference, order).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::AlreadySettled { .. }));
    assert_eq!(order_status(&shop, order).await, OrderStatus::Refunded);
    assert_eq!(
        transaction_status(&shop, &reference).await,
        TransactionStatus::Refunded
    );
    assert_eq!(shop.stock(product), Some(7));
}

#[tokio::test]
async fn test_failure_report_after_payment_keeps_success() {
    let shop = Shop::new();
    let (order, reference, _) = paid_order(&shop).await;
    shop.gateway.script(&reference, Verdict::Failed);

    let outcome = shop
        .deliver_webhook(&charge_event("charge.failed", &reference, order))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        WebhookOutcome::Reconciled(ReconcileOutcome::AlreadySettled { .. })
    ));
    assert_eq!(order_status(&shop, order).await, OrderStatus::Paid);
    assert_eq!(
        transaction_status(&shop, &reference).await,
        TransactionStatus::Success
    );
}

#[tokio::test]
async fn test_reversal_refunds_a_paid_order() {
    let shop = Shop::new();
    let (order, reference, product) = paid_order(&shop).await;

    shop.deliver_webhook(&nested_event("charge.reversed", &reference))
        .await
        .unwrap();
    assert_eq!(order_status(&shop, order).await, OrderStatus::Refunded);
    assert_eq!(
        transaction_status(&shop, &reference).await,
        TransactionStatus::Reversed
    );
    assert_eq!(shop.stock(product), Some(7));
}

#[tokio::test]
async fn test_admin_override_cannot_skip_reconciliation() {
    let shop = Shop::new();
    let product = shop.product("Sunburst Ankara", 16_000, 5);
    let details = shop.place_order(BUYER_ID, &[(product, 1)]).await.unwrap();

    let err = shop
        .orders()
        .set_status(details.order.id, OrderStatus::Paid)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(shop.stock(product), Some(5));

    let cancelled = shop
        .orders()
        .set_status(details.order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}
