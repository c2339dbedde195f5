//! Integration tests for checkout: cart to confirmed order.
//!
//! These tests verify that what the summary shows is what the order
//! stores, and that coupons and stock behave across the whole flow.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use vitrine_core::{OrderStatus, PaymentMethod};
use vitrine_integration_tests::{TestContext, address};
use vitrine_storefront::backend::CouponBackend;
use vitrine_storefront::checkout::{CheckoutStep, Gate};
use vitrine_storefront::services::{CouponOutcome, CouponRejection, ShippingQuote};

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_pix_order_with_shipping_and_coupon() {
    let ctx = TestContext::new().await;
    let mut storefront = ctx.customer("ana@example.com", "Ana").await;

    storefront.cart_mut().add_item(&ctx.headphones);
    storefront.cart_mut().add_item(&ctx.headphones);
    assert_eq!(
        storefront.checkout().gate(storefront.session(), storefront.cart()),
        Gate::Ready
    );

    storefront.checkout_mut().submit_address(&address()).unwrap();
    storefront.checkout_mut().select_payment(PaymentMethod::Pix);

    let ShippingQuote::Options(options) = storefront.shipping().calculate("01310-100").await else {
        panic!("São Paulo should be quotable");
    };
    let economic = options.into_iter().find(|o| o.id == "economic").unwrap();
    assert_eq!(economic.price, Decimal::new(1590, 2));
    storefront.checkout_mut().select_shipping(Some(economic));

    let CouponOutcome::Valid(applied) = storefront.apply_coupon("save10").await else {
        panic!("SAVE10 should apply");
    };
    assert_eq!(applied.code, "SAVE10");
    assert_eq!(applied.discount, Decimal::new(20, 0));

    // 200 + 15.90 - 10 (PIX) - 20 (coupon)
    let summary = storefront.checkout().summary(storefront.cart());
    assert_eq!(summary.total, Decimal::new(18590, 2));

    let order = storefront.submit_checkout().await.unwrap();
    assert_eq!(order.total, summary.total);
    assert_eq!(order.subtotal, summary.subtotal);
    assert_eq!(order.shipping_cost, summary.shipping);
    assert_eq!(order.discount, summary.discount());
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE10"));
    assert_eq!(order.shipping_option.as_deref(), Some("economic"));
    assert!(matches!(storefront.checkout().step(), CheckoutStep::Confirmation(_)));

    assert!(storefront.cart().is_empty());
    assert_eq!(ctx.stock_of(ctx.headphones.id), 3);

    let coupon = ctx.backend.find_active_coupon("SAVE10").await.unwrap().unwrap();
    assert_eq!(coupon.used_count, 1);

    let orders = storefront
        .orders()
        .list_for_user(storefront.session().unwrap())
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, order.id);
}

#[tokio::test]
async fn test_card_without_shipping_choice_pays_default_fee() {
    let ctx = TestContext::new().await;
    let mut storefront = ctx.customer("bia@example.com", "Bia").await;

    storefront.cart_mut().add_item(&ctx.tshirt);
    storefront.checkout_mut().submit_address(&address()).unwrap();

    let summary = storefront.checkout().summary(storefront.cart());
    assert_eq!(summary.shipping, Decimal::new(15, 0));
    assert_eq!(summary.total, Decimal::new(6490, 2));

    let order = storefront.submit_checkout().await.unwrap();
    assert_eq!(order.payment_method, PaymentMethod::CreditCard);
    assert_eq!(order.total, Decimal::new(6490, 2));
}

// =============================================================================
// Guards and rejections
// =============================================================================

#[tokio::test]
async fn test_checkout_requires_session_and_items() {
    let ctx = TestContext::new().await;

    let mut guest = ctx.storefront();
    guest.cart_mut().add_item(&ctx.tshirt);
    assert_eq!(
        guest.checkout().gate(guest.session(), guest.cart()),
        Gate::SignInRequired
    );

    let storefront = ctx.customer("caio@example.com", "Caio").await;
    assert_eq!(
        storefront.checkout().gate(storefront.session(), storefront.cart()),
        Gate::EmptyCart
    );
}

#[tokio::test]
async fn test_minimum_purchase_coupon() {
    let ctx = TestContext::new().await;
    let mut storefront = ctx.customer("duda@example.com", "Duda").await;
    storefront.cart_mut().add_item(&ctx.headphones);

    let outcome = storefront.apply_coupon("BIG50").await;
    assert_eq!(
        outcome,
        CouponOutcome::Invalid(CouponRejection::BelowMinimum {
            min_purchase: Decimal::new(300, 0)
        })
    );
    assert!(storefront.checkout().coupon().is_none());

    for _ in 0..2 {
        storefront.cart_mut().add_item(&ctx.headphones);
    }
    assert!(matches!(
        storefront.apply_coupon("BIG50").await,
        CouponOutcome::Valid(_)
    ));

    let outcome = storefront.apply_coupon("NOPE").await;
    assert_eq!(outcome, CouponOutcome::Invalid(CouponRejection::NotFound));
}

#[tokio::test]
async fn test_sold_out_between_cart_and_checkout_keeps_cart() {
    let ctx = TestContext::new().await;
    let mut first = ctx.customer("eva@example.com", "Eva").await;
    let mut second = ctx.customer("fabi@example.com", "Fabi").await;

    for _ in 0..5 {
        first.cart_mut().add_item(&ctx.headphones);
    }
    second.cart_mut().add_item(&ctx.headphones);

    first.checkout_mut().submit_address(&address()).unwrap();
    first.submit_checkout().await.unwrap();
    assert_eq!(ctx.stock_of(ctx.headphones.id), 0);

    second.checkout_mut().submit_address(&address()).unwrap();
    assert!(second.submit_checkout().await.is_err());
    assert_eq!(second.cart().total_items(), 1);
    assert_eq!(second.checkout().step(), &CheckoutStep::Payment);
}
