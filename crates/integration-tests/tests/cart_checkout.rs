//! Cart stock ceilings, guest-cart merge, totals and checkout.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use texos_core::models::GuestCartLine;
use texos_core::pricing::{DELIVERY_FEE_KEY, FREE_DELIVERY_THRESHOLD_KEY};
use texos_core::{ErrorKind, OrderStatus, ShopError};
use texos_integration_tests::{BUYER_ID, Shop, Verdict};

// ============================================================================
// Stock ceilings
// ============================================================================

#[tokio::test]
async fn test_add_succeeds_iff_cumulative_quantity_fits_stock() {
    const STOCK: i32 = 4;

    for existing in 0..=STOCK {
        for added in 1..=STOCK {
            let shop = Shop::new();
            let product = shop.product("Indigo Swirl Ankara", 18_500, STOCK);
            if existing > 0 {
                shop.add_to_cart(BUYER_ID, product, existing).await.unwrap();
            }

            let result = shop.add_to_cart(BUYER_ID, product, added).await;
            let in_cart = shop.quantity_in_cart(BUYER_ID, product).await.unwrap();

            if existing + added <= STOCK {
                assert!(result.is_ok(), "{existing}+{added} should fit stock {STOCK}");
                assert_eq!(in_cart, existing + added);
            } else {
                assert!(
                    matches!(
                        result,
                        Err(ShopError::InsufficientStock { available: STOCK, in_cart }) if in_cart == existing
                    ),
                    "{existing}+{added} should be refused"
                );
                assert_eq!(in_cart, existing, "a refused add leaves the cart unchanged");
            }
        }
    }
}

#[tokio::test]
async fn test_cumulative_refusal_reports_remaining_capacity() {
    let shop = Shop::new();
    let product = shop.product("Sunburst Ankara", 16_000, 4);
    shop.add_to_cart(BUYER_ID, product, 3).await.unwrap();

    let err = shop.add_to_cart(BUYER_ID, product, 2).await.unwrap_err();
    assert_eq!(err.to_string(), "Only 1 more item(s) can be added to cart");
}

#[tokio::test]
async fn test_sold_out_product_is_out_of_stock() {
    let shop = Shop::new();
    let product = shop.product("Emerald Beaded Lace", 98_000, 0);

    let err = shop.add_to_cart(BUYER_ID, product, 1).await.unwrap_err();
    assert!(matches!(err, ShopError::OutOfStock));
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// ============================================================================
// Guest-cart merge
// ============================================================================

#[tokio::test]
async fn test_guest_merge_stacks_on_server_cart_and_reports_per_line() {
    let shop = Shop::new();
    let lace = shop.product("Champagne Cord Lace", 45_000, 5);
    let ankara = shop.product("Indigo Swirl Ankara", 18_500, 10);
    let aso_oke = shop.product("Wine Aso Oke Set", 65_000, 2);

    shop.add_to_cart(BUYER_ID, lace, 3).await.unwrap();

    let first = shop
        .cart()
        .merge_guest_cart(
            BUYER_ID,
            &[GuestCartLine::new(lace, 2), GuestCartLine::new(ankara, 1)],
        )
        .await
        .unwrap();
    assert_eq!(first.merged_count, 2);
    assert!(first.errors.is_empty());
    assert_eq!(shop.quantity_in_cart(BUYER_ID, lace).await.unwrap(), 5);

    let second = shop
        .cart()
        .merge_guest_cart(
            BUYER_ID,
            &[GuestCartLine::new(lace, 1), GuestCartLine::new(aso_oke, 1)],
        )
        .await
        .unwrap();
    assert_eq!(second.merged_count, 1);
    assert_eq!(second.errors.len(), 1);
    assert_eq!(second.errors[0].product_id, lace);
    assert_eq!(
        second.errors[0].error,
        "Only 0 more item(s) can be added to cart"
    );
    assert_eq!(shop.quantity_in_cart(BUYER_ID, lace).await.unwrap(), 5);
    assert_eq!(shop.quantity_in_cart(BUYER_ID, aso_oke).await.unwrap(), 1);
}

#[tokio::test]
async fn test_guest_merge_ignores_client_supplied_price_and_stock() {
    let shop = Shop::new();
    let product = shop.product("Sunburst Ankara", 16_000, 2);

    let mut line = GuestCartLine::new(product, 2);
    line.price = Some(Decimal::ONE);
    line.stock = Some(99);
    shop.cart().merge_guest_cart(BUYER_ID, &[line]).await.unwrap();

    let view = shop.cart().view(BUYER_ID).await.unwrap();
    assert_eq!(view.totals.subtotal, Decimal::from(32_000));
}

// ============================================================================
// Totals
// ============================================================================

#[tokio::test]
async fn test_delivery_is_free_exactly_at_the_threshold() {
    let shop = Shop::new();
    shop.store.set_setting(FREE_DELIVERY_THRESHOLD_KEY, "100");
    shop.store.set_setting(DELIVERY_FEE_KEY, "5");

    let at_threshold = shop.product("Remnant A", 50, 10);
    shop.add_to_cart(BUYER_ID, at_threshold, 2).await.unwrap();
    let totals = shop.cart().view(BUYER_ID).await.unwrap().totals;
    assert_eq!(totals.subtotal, Decimal::from(100));
    assert_eq!(totals.delivery_fee, Decimal::ZERO);
    assert_eq!(totals.free_delivery_progress, Decimal::ONE);

    let shop = Shop::new();
    shop.store.set_setting(FREE_DELIVERY_THRESHOLD_KEY, "100");
    shop.store.set_setting(DELIVERY_FEE_KEY, "5");
    let below = shop.product("Remnant B", 99, 10);
    shop.add_to_cart(BUYER_ID, below, 1).await.unwrap();
    let totals = shop.cart().view(BUYER_ID).await.unwrap().totals;
    assert_eq!(totals.delivery_fee, Decimal::from(5));
    assert_eq!(totals.total, Decimal::from(104));
}

#[tokio::test]
async fn test_settings_change_applies_to_the_next_view() {
    let shop = Shop::new();
    let product = shop.product("Remnant", 60, 10);
    shop.add_to_cart(BUYER_ID, product, 1).await.unwrap();
    shop.store.set_setting(FREE_DELIVERY_THRESHOLD_KEY, "100");
    shop.store.set_setting(DELIVERY_FEE_KEY, "7.5");
    assert_eq!(
        shop.cart().view(BUYER_ID).await.unwrap().totals.delivery_fee,
        Decimal::new(750, 2)
    );

    shop.store.set_setting(FREE_DELIVERY_THRESHOLD_KEY, "50");
    assert_eq!(
        shop.cart().view(BUYER_ID).await.unwrap().totals.delivery_fee,
        Decimal::ZERO
    );
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_empty_cart_checkout_is_rejected_without_an_order() {
    let shop = Shop::new();

    let err = shop.orders().checkout(BUYER_ID, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "Cart is empty");
    assert_eq!(shop.store.order_count(), 0);
}

#[tokio::test]
async fn test_order_total_is_locked_at_checkout() {
    let shop = Shop::new();
    let product = shop.product("Champagne Cord Lace", 45_000, 5);
    let details = shop.place_order(BUYER_ID, &[(product, 2)]).await.unwrap();
    assert_eq!(details.order.total_amount, Decimal::from(90_000));
    assert_eq!(details.order.status, OrderStatus::Pending);

    shop.store.set_price(product, Decimal::from(60_000));

    let reloaded = shop.orders().get_order(details.order.id).await.unwrap();
    assert_eq!(reloaded.order.total_amount, Decimal::from(90_000));
    assert_eq!(reloaded.items[0].unit_price, Decimal::from(45_000));

    // The gateway is asked for the stored total, not the repriced cart.
    shop.start_payment(BUYER_ID, details.order.id).await.unwrap();
    assert_eq!(shop.gateway.initialized()[0].amount_minor, 9_000_000);
}

#[tokio::test]
async fn test_cart_survives_checkout_and_a_failed_payment() {
    let shop = Shop::new();
    let product = shop.product("Sunburst Ankara", 16_000, 5);
    let details = shop.place_order(BUYER_ID, &[(product, 2)]).await.unwrap();
    assert_eq!(shop.quantity_in_cart(BUYER_ID, product).await.unwrap(), 2);

    let reference = shop.start_payment(BUYER_ID, details.order.id).await.unwrap();
    shop.gateway.script(&reference, Verdict::Failed);
    shop.poll(BUYER_ID, &reference, details.order.id)
        .await
        .unwrap();

    assert_eq!(shop.quantity_in_cart(BUYER_ID, product).await.unwrap(), 2);

    // The buyer can come back and check out again.
    let retry = shop.orders().checkout(BUYER_ID, None).await.unwrap();
    assert_ne!(retry.order.id, details.order.id);
    assert_eq!(retry.order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_checkout_rejects_another_buyers_address() {
    let shop = Shop::new();
    let product = shop.product("Sunburst Ankara", 16_000, 5);
    let foreign = shop
        .addresses()
        .create(
            texos_integration_tests::OTHER_BUYER_ID,
            texos_integration_tests::address_input("4 Allen Avenue", true),
        )
        .await
        .unwrap();

    shop.add_to_cart(BUYER_ID, product, 1).await.unwrap();
    let err = shop
        .orders()
        .checkout(BUYER_ID, Some(foreign.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(shop.store.order_count(), 0);
}
