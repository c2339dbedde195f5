//! Orders and their realtime status events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vitrine_core::{OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

use super::ShippingAddress;

/// A line of an order, frozen at purchase time.
///
/// `unit_price` is the price the customer paid, decoupled from the live
/// product price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub image_url: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderItem {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order payload submitted by the client; the backend assigns id, status and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_option: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    /// PIX and coupon discounts combined.
    pub discount: Decimal,
    pub total: Decimal,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_option: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a pending order from a submitted payload.
    #[must_use]
    pub fn from_new(id: OrderId, new: NewOrder, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            items: new.items,
            shipping_address: new.shipping_address,
            payment_method: new.payment_method,
            shipping_option: new.shipping_option,
            coupon_code: new.coupon_code,
            status: OrderStatus::Pending,
            subtotal: new.subtotal,
            shipping_cost: new.shipping_cost,
            discount: new.discount,
            total: new.total,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// A row-change event pushed by the realtime feed for an order.
///
/// Delivery is at-least-once; consumers must apply events idempotently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderStatusEvent {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            status: order.status,
            updated_at: order.updated_at,
        }
    }
}
