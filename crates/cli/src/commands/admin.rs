//! Back-office commands.
//!
//! # Usage
//!
//! ```bash
//! vitrine admin dashboard
//! vitrine admin orders --status pending
//! vitrine admin status <order-id> shipped
//! vitrine admin stock <product-id> 40
//! vitrine admin coupon --code NATAL20 --value 20 --valid-days 30
//! ```
//!
//! Every command requires a signed-in admin account.

use chrono::{Duration, Utc};

use vitrine_core::{CouponId, OrderId, OrderStatus, ProductId};
use vitrine_storefront::Storefront;
use vitrine_storefront::backend::Backend;
use vitrine_storefront::models::{Coupon, DiscountType};
use vitrine_storefront::pricing::format_price;

use super::{AdminAction, CommandResult, CouponArgs, fail, parse_id, require_session};

fn discount_type(raw: &str) -> Result<DiscountType, Box<dyn std::error::Error>> {
    match raw.trim().to_lowercase().as_str() {
        "percentage" | "percent" | "%" => Ok(DiscountType::Percentage),
        "fixed" => Ok(DiscountType::Fixed),
        other => Err(format!("unknown coupon kind: {other} (percentage or fixed)").into()),
    }
}

fn coupon_from_args(args: CouponArgs) -> Result<Coupon, Box<dyn std::error::Error>> {
    let now = Utc::now();
    Ok(Coupon {
        id: CouponId::generate(),
        code: args.code,
        discount_type: discount_type(&args.kind)?,
        discount_value: args.value,
        min_purchase: args.min_purchase,
        max_uses: args.max_uses,
        used_count: 0,
        valid_from: now,
        valid_until: args.valid_days.map(|days| now + Duration::days(days)),
        active: true,
    })
}

/// Admin subcommands.
///
/// # Errors
///
/// Returns an error when the session is missing or not an admin, for an
/// unknown order or product, or for an invalid status change.
pub async fn run<B: Backend>(storefront: &Storefront<B>, action: AdminAction) -> CommandResult {
    let session = require_session(storefront.session())?;
    let admin = storefront.admin();

    match action {
        AdminAction::Dashboard => {
            let dashboard = admin.dashboard(session).await.map_err(fail)?;
            println!("Revenue: {}", format_price(dashboard.revenue));
            println!("Orders:  {}", dashboard.order_count);
            for (status, count) in &dashboard.orders_by_status {
                println!("  {:<12} {count}", status.to_string());
            }
            if !dashboard.low_stock.is_empty() {
                println!("Low stock:");
                for product in &dashboard.low_stock {
                    println!("  {:>4}  {}  {}", product.stock, product.id, product.name);
                }
            }
            if !dashboard.recent_orders.is_empty() {
                println!("Recent orders:");
                for order in &dashboard.recent_orders {
                    println!(
                        "  {}  {}  {:<10} {:>14}",
                        order.id,
                        order.created_at.format("%d/%m %H:%M"),
                        order.status.to_string(),
                        format_price(order.total)
                    );
                }
            }
        }
        AdminAction::Orders { status } => {
            let status = status.map(|s| s.parse::<OrderStatus>()).transpose()?;
            let orders = admin.list_orders(session, status).await.map_err(fail)?;
            if orders.is_empty() {
                println!("No orders");
            }
            for order in &orders {
                println!(
                    "{}  {}  {:<10} {:<24} {:>14}",
                    order.id,
                    order.created_at.format("%d/%m/%Y %H:%M"),
                    order.status.to_string(),
                    order.shipping_address.full_name,
                    format_price(order.total)
                );
            }
        }
        AdminAction::Status { order_id, status } => {
            let id: OrderId = parse_id(&order_id, "order")?;
            let status: OrderStatus = status.parse()?;
            let order = admin
                .update_order_status(session, id, status)
                .await
                .map_err(fail)?;
            println!("Order {} is now {}", order.id, order.status);
        }
        AdminAction::Stock { product_id, stock } => {
            let id: ProductId = parse_id(&product_id, "product")?;
            let product = admin.set_stock(session, id, stock).await.map_err(fail)?;
            println!("{} now has {} in stock", product.name, product.stock);
        }
        AdminAction::Coupon(args) => {
            let coupon = admin
                .upsert_coupon(session, coupon_from_args(args)?)
                .await
                .map_err(fail)?;
            println!(
                "Coupon {} saved ({:?} {}, used {} times)",
                coupon.code, coupon.discount_type, coupon.discount_value, coupon.used_count
            );
        }
    }
    Ok(())
}
