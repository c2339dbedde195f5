//! Integration tests for order status changes and realtime notifications.

#![allow(clippy::unwrap_used)]

use vitrine_core::{NotificationKind, OrderStatus};
use vitrine_integration_tests::{TestContext, address};
use vitrine_storefront::backend::{InMemoryBackend, OrderBackend};
use vitrine_storefront::models::Order;
use vitrine_storefront::services::{AdminError, OrderError};
use vitrine_storefront::{AppError, Storefront};

async fn place_order(ctx: &TestContext, storefront: &mut Storefront<InMemoryBackend>) -> Order {
    storefront.cart_mut().add_item(&ctx.headphones);
    storefront.checkout_mut().submit_address(&address()).unwrap();
    storefront.submit_checkout().await.unwrap()
}

// =============================================================================
// Status changes
// =============================================================================

#[tokio::test]
async fn test_admin_status_changes_reach_the_customer() {
    let ctx = TestContext::new().await;
    let mut storefront = ctx.customer("ana@example.com", "Ana").await;
    let order = place_order(&ctx, &mut storefront).await;

    let admin = ctx.storefront();
    for status in [OrderStatus::Processing, OrderStatus::Shipped] {
        admin
            .admin()
            .update_order_status(&ctx.admin, order.id, status)
            .await
            .unwrap();
    }

    let applied = storefront.apply_order_updates();
    assert_eq!(
        applied.iter().map(|e| e.status).collect::<Vec<_>>(),
        [OrderStatus::Processing, OrderStatus::Shipped]
    );

    let notifications = storefront.notifications().unwrap();
    assert_eq!(notifications.unread_count(), 2);
    assert!(
        notifications
            .items()
            .iter()
            .all(|n| n.kind == NotificationKind::Order)
    );

    let tracked = storefront
        .orders()
        .track(storefront.session().unwrap(), order.id)
        .await
        .unwrap();
    assert_eq!(tracked.status, OrderStatus::Shipped);
}

#[tokio::test]
async fn test_status_cannot_move_backwards() {
    let ctx = TestContext::new().await;
    let mut storefront = ctx.customer("bia@example.com", "Bia").await;
    let order = place_order(&ctx, &mut storefront).await;

    let admin = ctx.storefront();
    admin
        .admin()
        .update_order_status(&ctx.admin, order.id, OrderStatus::Delivered)
        .await
        .unwrap();

    let result = admin
        .admin()
        .update_order_status(&ctx.admin, order.id, OrderStatus::Processing)
        .await;
    assert!(matches!(
        result,
        Err(AdminError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Processing
        })
    ));

    let result = storefront
        .orders()
        .cancel(storefront.session().unwrap(), order.id)
        .await;
    assert!(matches!(result, Err(OrderError::NotCancellable)));
}

#[tokio::test]
async fn test_customer_cannot_use_admin_operations() {
    let ctx = TestContext::new().await;
    let storefront = ctx.customer("caio@example.com", "Caio").await;
    let session = storefront.session().unwrap();

    assert!(matches!(
        storefront.admin().dashboard(session).await,
        Err(AdminError::Forbidden)
    ));
    assert!(matches!(
        storefront.admin().set_stock(session, ctx.tshirt.id, 0).await,
        Err(AdminError::Forbidden)
    ));
}

// =============================================================================
// Cancellation and visibility
// =============================================================================

#[tokio::test]
async fn test_cancel_restocks_and_notifies() {
    let ctx = TestContext::new().await;
    let mut storefront = ctx.customer("duda@example.com", "Duda").await;
    let order = place_order(&ctx, &mut storefront).await;
    assert_eq!(ctx.stock_of(ctx.headphones.id), 4);

    let cancelled = storefront
        .orders()
        .cancel(storefront.session().unwrap(), order.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(ctx.stock_of(ctx.headphones.id), 5);

    assert_eq!(storefront.apply_order_updates().len(), 1);
    assert!(storefront.apply_order_updates().is_empty());

    let dashboard = ctx
        .storefront()
        .admin()
        .dashboard(&ctx.admin)
        .await
        .unwrap();
    assert_eq!(dashboard.order_count, 1);
    assert!(dashboard.revenue.is_zero());
}

#[tokio::test]
async fn test_orders_are_private() {
    let ctx = TestContext::new().await;
    let mut owner = ctx.customer("eva@example.com", "Eva").await;
    let order = place_order(&ctx, &mut owner).await;

    let mut other = ctx.customer("fabi@example.com", "Fabi").await;
    let session = other.session().unwrap().clone();
    assert!(matches!(
        other.orders().track(&session, order.id).await,
        Err(OrderError::NotFound)
    ));
    assert!(other.orders().list_for_user(&session).await.unwrap().is_empty());

    ctx.backend
        .update_order_status(&ctx.admin, order.id, OrderStatus::Processing)
        .await
        .unwrap();
    assert!(other.apply_order_updates().is_empty());
    assert_eq!(owner.apply_order_updates().len(), 1);

    let visible = ctx
        .storefront()
        .orders()
        .track(&ctx.admin, order.id)
        .await
        .unwrap();
    assert_eq!(visible.id, order.id);
}

#[tokio::test]
async fn test_signed_out_checkout_is_refused() {
    let ctx = TestContext::new().await;
    let mut storefront = ctx.storefront();
    storefront.cart_mut().add_item(&ctx.tshirt);
    storefront.checkout_mut().submit_address(&address()).unwrap();

    let result = storefront.submit_checkout().await;
    assert!(matches!(result, Err(AppError::Checkout(_))));
    assert_eq!(storefront.cart().total_items(), 1);
}
