//! Order history, tracking and cancellation.

use vitrine_core::OrderId;
use vitrine_storefront::Storefront;
use vitrine_storefront::backend::Backend;
use vitrine_storefront::models::Order;
use vitrine_storefront::pricing::format_price;
use vitrine_storefront::services::orders::status_notification;

use super::{CommandResult, OrdersAction, fail, parse_id, require_session};

fn print_summary(order: &Order) {
    println!(
        "{}  {}  {:<10} {:>3} items  {:>14}",
        order.id,
        order.created_at.format("%d/%m/%Y %H:%M"),
        order.status.to_string(),
        order.item_count(),
        format_price(order.total)
    );
}

fn print_detail(order: &Order) {
    print_summary(order);
    for item in &order.items {
        println!(
            "    {:>3} × {:<32} {:>14}",
            item.quantity,
            item.name,
            format_price(item.line_total())
        );
    }
    println!("    Ship to: {}", order.shipping_address.one_line());
    println!("    Payment: {}", order.payment_method);
    if let Some(code) = &order.coupon_code {
        println!("    Coupon:  {code}");
    }
    println!(
        "    Subtotal {}  shipping {}  discount {}",
        format_price(order.subtotal),
        format_price(order.shipping_cost),
        format_price(order.discount)
    );
}

/// Order subcommands.
///
/// # Errors
///
/// Returns an error when signed out, for an unknown order or when the
/// order can no longer be cancelled.
pub async fn run<B: Backend>(
    storefront: &mut Storefront<B>,
    action: OrdersAction,
) -> CommandResult {
    let session = require_session(storefront.session())?.clone();

    match action {
        OrdersAction::List => {
            let orders = storefront
                .orders()
                .list_for_user(&session)
                .await
                .map_err(fail)?;
            if orders.is_empty() {
                println!("No orders yet");
            }
            for order in &orders {
                print_summary(order);
            }
        }
        OrdersAction::Track { order_id } => {
            let id: OrderId = parse_id(&order_id, "order")?;
            let order = storefront
                .orders()
                .track(&session, id)
                .await
                .map_err(fail)?;
            print_detail(&order);
        }
        OrdersAction::Cancel { order_id } => {
            let id: OrderId = parse_id(&order_id, "order")?;
            let order = storefront
                .orders()
                .cancel(&session, id)
                .await
                .map_err(fail)?;
            println!("Order {} is now {}", order.id, order.status);
        }
        OrdersAction::Watch => {
            println!("Watching your orders (Ctrl-C to stop)");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = storefront.next_order_update() => {
                        let Some(event) = event else { break };
                        let note = status_notification(&event);
                        println!(
                            "{}  {}",
                            event.updated_at.format("%H:%M:%S"),
                            note.message
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
