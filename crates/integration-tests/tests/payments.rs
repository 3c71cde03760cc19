//! Payment reconciliation across the poll, webhook and admin paths.

#![allow(clippy::unwrap_used)]

use texos_core::models::Transaction;
use texos_core::services::{ReconcileOutcome, WebhookOutcome};
use texos_core::store::TransactionStore;
use texos_core::{ErrorKind, OrderId, OrderStatus, ProductId, TransactionStatus};
use texos_integration_tests::{BUYER_ID, OTHER_BUYER_ID, Shop, Verdict, charge_event};

/// One pending order for two lace pieces and one ankara, with a payment
/// started. Stock starts at 5 and 10.
async fn pending_payment(shop: &Shop) -> (OrderId, String, ProductId, ProductId) {
    let lace = shop.product("Champagne Cord Lace", 45_000, 5);
    let ankara = shop.product("Indigo Swirl Ankara", 18_500, 10);
    let details = shop
        .place_order(BUYER_ID, &[(lace, 2), (ankara, 1)])
        .await
        .unwrap();
    let reference = shop.start_payment(BUYER_ID, details.order.id).await.unwrap();
    (details.order.id, reference, lace, ankara)
}

async fn transaction(shop: &Shop, reference: &str) -> Transaction {
    shop.store
        .transaction_by_reference(reference)
        .await
        .unwrap()
        .unwrap()
}

// ============================================================================
// Initialization
// ============================================================================

#[tokio::test]
async fn test_initialize_records_a_pending_transaction_first() {
    let shop = Shop::new();
    let (order_id, reference, _, _) = pending_payment(&shop).await;

    let tx = transaction(&shop, &reference).await;
    assert_eq!(tx.order_id, order_id);
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.metadata["order_id"], order_id.as_i32());
    assert_eq!(tx.metadata["user_id"], BUYER_ID.as_i32());

    let init = &shop.gateway.initialized()[0];
    assert_eq!(init.reference, reference);
    assert_eq!(init.amount_minor, 10_850_000);
}

#[tokio::test]
async fn test_initialize_refuses_another_buyers_order() {
    let shop = Shop::new();
    let product = shop.product("Sunburst Ankara", 16_000, 5);
    let details = shop.place_order(BUYER_ID, &[(product, 1)]).await.unwrap();

    let err = shop
        .start_payment(OTHER_BUYER_ID, details.order.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(shop.gateway.initialized().is_empty());
}

#[tokio::test]
async fn test_initialize_refuses_a_settled_order() {
    let shop = Shop::new();
    let (order_id, reference, _, _) = pending_payment(&shop).await;
    shop.gateway.script(&reference, Verdict::Success);
    shop.poll(BUYER_ID, &reference, order_id).await.unwrap();

    let err = shop.start_payment(BUYER_ID, order_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_gateway_refusal_marks_the_attempt_failed() {
    let shop = Shop::new();
    let product = shop.product("Sunburst Ankara", 16_000, 5);
    let details = shop.place_order(BUYER_ID, &[(product, 1)]).await.unwrap();
    shop.gateway.refuse_initialize();

    let err = shop
        .start_payment(BUYER_ID, details.order.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);

    let latest = shop
        .store
        .latest_transaction_for_order(details.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.status, TransactionStatus::Failed);
    let order = shop.orders().get_order(details.order.id).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Pending);
}

// ============================================================================
// Poll path
// ============================================================================

#[tokio::test]
async fn test_successful_poll_pays_decrements_and_clears_cart() {
    let shop = Shop::new();
    let (order_id, reference, lace, ankara) = pending_payment(&shop).await;
    shop.gateway.script(&reference, Verdict::Success);

    let outcome = shop.poll(BUYER_ID, &reference, order_id).await.unwrap();
    let ReconcileOutcome::Paid { order, stock } = outcome else {
        panic!("expected Paid, got {outcome:?}");
    };
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(stock.len(), 2);
    assert!(stock.iter().all(|line| line.remaining.is_some()));

    assert_eq!(shop.stock(lace), Some(3));
    assert_eq!(shop.stock(ankara), Some(9));
    assert_eq!(
        transaction(&shop, &reference).await.status,
        TransactionStatus::Success
    );
    assert!(shop.cart().view(BUYER_ID).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn test_pending_poll_changes_nothing() {
    let shop = Shop::new();
    let (order_id, reference, lace, _) = pending_payment(&shop).await;

    let outcome = shop.poll(BUYER_ID, &reference, order_id).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Pending);
    assert_eq!(shop.stock(lace), Some(5));
    assert_eq!(
        shop.orders().get_order(order_id).await.unwrap().order.status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_failed_verification_cancels_without_touching_stock() {
    let shop = Shop::new();
    let (order_id, reference, lace, ankara) = pending_payment(&shop).await;
    shop.gateway.script(&reference, Verdict::Failed);

    let outcome = shop.poll(BUYER_ID, &reference, order_id).await.unwrap();
    assert!(matches!(
        outcome,
        ReconcileOutcome::Cancelled { ref order } if order.status == OrderStatus::Cancelled
    ));
    assert_eq!(
        transaction(&shop, &reference).await.status,
        TransactionStatus::Failed
    );
    assert_eq!(shop.stock(lace), Some(5));
    assert_eq!(shop.stock(ankara), Some(10));
}

#[tokio::test]
async fn test_abandoned_payment_is_treated_as_failed() {
    let shop = Shop::new();
    let (order_id, reference, _, _) = pending_payment(&shop).await;
    shop.gateway.script(&reference, Verdict::Abandoned);

    let outcome = shop.poll(BUYER_ID, &reference, order_id).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Cancelled { .. }));
}

#[tokio::test]
async fn test_verify_timeout_is_unknown_not_failed() {
    let shop = Shop::new();
    let (order_id, reference, lace, _) = pending_payment(&shop).await;
    shop.gateway.script(&reference, Verdict::Timeout);

    let outcome = shop.poll(BUYER_ID, &reference, order_id).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::VerificationUnavailable);
    assert_eq!(
        transaction(&shop, &reference).await.status,
        TransactionStatus::Pending
    );
    assert_eq!(
        shop.orders().get_order(order_id).await.unwrap().order.status,
        OrderStatus::Pending
    );
    assert_eq!(shop.stock(lace), Some(5));

    // Once the gateway answers, the same reference settles normally.
    shop.gateway.script(&reference, Verdict::Success);
    let outcome = shop.poll(BUYER_ID, &reference, order_id).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Paid { .. }));
}

#[tokio::test]
async fn test_unreachable_gateway_is_an_upstream_error() {
    let shop = Shop::new();
    let (order_id, reference, _, _) = pending_payment(&shop).await;
    shop.gateway.script(&reference, Verdict::Unreachable);

    let err = shop.poll(BUYER_ID, &reference, order_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert_eq!(
        transaction(&shop, &reference).await.status,
        TransactionStatus::Pending
    );
}

#[tokio::test]
async fn test_amount_mismatch_needs_attention_and_is_not_paid() {
    let shop = Shop::new();
    let (order_id, reference, lace, _) = pending_payment(&shop).await;
    shop.gateway
        .script_with_amount(&reference, Verdict::Success, 100);

    let outcome = shop.poll(BUYER_ID, &reference, order_id).await.unwrap();
    assert!(matches!(
        outcome,
        ReconcileOutcome::NeedsAttention { ref reason, .. } if reason == "amount_mismatch"
    ));
    assert_eq!(
        shop.orders().get_order(order_id).await.unwrap().order.status,
        OrderStatus::Pending
    );
    assert_eq!(shop.stock(lace), Some(5));
    // The mismatched charge is not recorded as a success.
    assert_eq!(
        transaction(&shop, &reference).await.status,
        TransactionStatus::Pending
    );
}

#[tokio::test]
async fn test_malformed_reference_is_rejected_before_the_gateway() {
    let shop = Shop::new();
    let (order_id, _, _, _) = pending_payment(&shop).await;

    let err = shop
        .poll(BUYER_ID, "../transaction/verify", order_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(shop.gateway.verify_calls("../transaction/verify"), 0);
}

#[tokio::test]
async fn test_reference_of_another_order_is_a_conflict() {
    let shop = Shop::new();
    let (_, reference, _, _) = pending_payment(&shop).await;
    let product = shop.product("Sunburst Ankara", 16_000, 5);
    let other = shop
        .place_order(OTHER_BUYER_ID, &[(product, 1)])
        .await
        .unwrap();
    shop.gateway.script(&reference, Verdict::Success);

    let err = shop
        .poll(OTHER_BUYER_ID, &reference, other.order.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(shop.gateway.verify_calls(&reference), 0);
}

#[tokio::test]
async fn test_missing_transaction_row_is_recorded_from_the_hint() {
    let shop = Shop::new();
    let product = shop.product("Wine Aso Oke Set", 65_000, 3);
    let details = shop.place_order(BUYER_ID, &[(product, 1)]).await.unwrap();
    let reference = "T685312322670591";
    shop.gateway
        .script_with_amount(reference, Verdict::Success, 6_500_000);

    let outcome = shop
        .poll(BUYER_ID, reference, details.order.id)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Paid { .. }));

    let tx = transaction(&shop, reference).await;
    assert_eq!(tx.order_id, details.order.id);
    assert_eq!(tx.status, TransactionStatus::Success);
    assert_eq!(shop.stock(product), Some(2));
}

// ============================================================================
// Idempotency across paths
// ============================================================================

#[tokio::test]
async fn test_replayed_success_webhook_decrements_once() {
    let shop = Shop::new();
    let (order_id, reference, lace, ankara) = pending_payment(&shop).await;
    shop.gateway.script(&reference, Verdict::Success);
    let event = charge_event("charge.success", &reference, order_id);

    let mut paid = 0;
    for _ in 0..5 {
        match shop.deliver_webhook(&event).await.unwrap() {
            WebhookOutcome::Reconciled(ReconcileOutcome::Paid { .. }) => paid += 1,
            WebhookOutcome::Reconciled(ReconcileOutcome::AlreadySettled { order }) => {
                assert_eq!(order.status, OrderStatus::Paid);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(paid, 1);
    assert_eq!(shop.stock(lace), Some(3));
    assert_eq!(shop.stock(ankara), Some(9));
    assert_eq!(
        shop.orders().get_order(order_id).await.unwrap().order.status,
        OrderStatus::Paid
    );
    // Every delivery was confirmed with the gateway.
    assert_eq!(shop.gateway.verify_calls(&reference), 5);
}

#[tokio::test]
async fn test_webhook_after_poll_does_not_repeat_fulfillment() {
    let shop = Shop::new();
    let (order_id, reference, lace, _) = pending_payment(&shop).await;
    shop.gateway.script(&reference, Verdict::Success);

    let polled = shop.poll(BUYER_ID, &reference, order_id).await.unwrap();
    assert!(matches!(polled, ReconcileOutcome::Paid { .. }));

    // The buyer starts shopping again before the webhook lands.
    shop.add_to_cart(BUYER_ID, lace, 1).await.unwrap();

    let delivered = shop
        .deliver_webhook(&charge_event("charge.success", &reference, order_id))
        .await
        .unwrap();
    assert!(matches!(
        delivered,
        WebhookOutcome::Reconciled(ReconcileOutcome::AlreadySettled { .. })
    ));
    assert_eq!(shop.stock(lace), Some(3));
    assert_eq!(shop.quantity_in_cart(BUYER_ID, lace).await.unwrap(), 1);
}

#[tokio::test]
async fn test_admin_reconcile_converges_with_the_poll() {
    let shop = Shop::new();
    let (order_id, reference, lace, _) = pending_payment(&shop).await;
    shop.gateway.script(&reference, Verdict::Success);

    let admin = shop.admin_reconcile(&reference, order_id).await.unwrap();
    assert!(matches!(admin, ReconcileOutcome::Paid { .. }));

    let poll = shop.poll(BUYER_ID, &reference, order_id).await.unwrap();
    assert!(matches!(poll, ReconcileOutcome::AlreadySettled { .. }));
    assert_eq!(shop.stock(lace), Some(3));
}

#[tokio::test]
async fn test_success_after_cancel_needs_attention() {
    let shop = Shop::new();
    let (order_id, reference, lace, _) = pending_payment(&shop).await;
    shop.gateway.script(&reference, Verdict::Failed);
    shop.poll(BUYER_ID, &reference, order_id).await.unwrap();

    // The gateway later changes its mind.
    shop.gateway.script(&reference, Verdict::Success);
    let outcome = shop.admin_reconcile(&reference, order_id).await.unwrap();
    assert!(matches!(
        outcome,
        ReconcileOutcome::NeedsAttention { ref order, ref reason }
            if order.status == OrderStatus::Cancelled && reason == "paid_after_cancel"
    ));
    assert_eq!(shop.stock(lace), Some(5));
}

#[tokio::test]
async fn test_racing_poll_and_webhook_fulfil_once() {
    for _ in 0..20 {
        let shop = Shop::new();
        let (order_id, reference, lace, ankara) = pending_payment(&shop).await;
        shop.gateway.script(&reference, Verdict::Success);

        let poller = {
            let shop = shop.clone();
            let reference = reference.clone();
            tokio::spawn(async move { shop.poll(BUYER_ID, &reference, order_id).await })
        };
        let webhook = {
            let shop = shop.clone();
            let event = charge_event("charge.success", &reference, order_id);
            tokio::spawn(async move { shop.deliver_webhook(&event).await })
        };

        let polled = poller.await.unwrap().unwrap();
        let delivered = match webhook.await.unwrap().unwrap() {
            WebhookOutcome::Reconciled(outcome) => outcome,
            other => panic!("unexpected webhook outcome {other:?}"),
        };

        let paid = [&polled, &delivered]
            .iter()
            .filter(|o| matches!(o, ReconcileOutcome::Paid { .. }))
            .count();
        assert_eq!(paid, 1, "poll={polled:?} webhook={delivered:?}");
        assert_eq!(shop.stock(lace), Some(3));
        assert_eq!(shop.stock(ankara), Some(9));
    }
}

#[tokio::test]
async fn test_oversold_line_is_skipped_and_the_order_still_pays() {
    let shop = Shop::new();
    let lace = shop.product("Emerald Beaded Lace", 98_000, 4);

    let first = shop.place_order(BUYER_ID, &[(lace, 3)]).await.unwrap();
    let second = shop
        .place_order(OTHER_BUYER_ID, &[(lace, 3)])
        .await
        .unwrap();
    let first_ref = shop.start_payment(BUYER_ID, first.order.id).await.unwrap();
    let second_ref = shop
        .start_payment(OTHER_BUYER_ID, second.order.id)
        .await
        .unwrap();
    shop.gateway.script(&first_ref, Verdict::Success);
    shop.gateway.script(&second_ref, Verdict::Success);

    shop.poll(BUYER_ID, &first_ref, first.order.id)
        .await
        .unwrap();
    let outcome = shop
        .poll(OTHER_BUYER_ID, &second_ref, second.order.id)
        .await
        .unwrap();

    let ReconcileOutcome::Paid { order, stock } = outcome else {
        panic!("expected Paid, got {outcome:?}");
    };
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(stock[0].remaining, None);
    assert_eq!(shop.stock(lace), Some(1));
}
