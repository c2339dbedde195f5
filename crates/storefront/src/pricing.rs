//! Price display and order total arithmetic.
//!
//! [`OrderPricing::compute`] is the only place an order total is derived. The
//! checkout summary and the order submission both call it, so the value the
//! customer sees is the value that gets persisted.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use vitrine_core::{PaymentMethod, Price, round_money};

/// Share of the subtotal taken off when paying with PIX (5 %).
pub const PIX_DISCOUNT_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Shipping charged for non-PIX payments when no shipping option was chosen.
pub const DEFAULT_SHIPPING_FEE: Decimal = Decimal::from_parts(1500, 0, 0, false, 2);

/// Format an amount in reais, e.g. `R$ 1.234,56`.
#[must_use]
pub fn format_price(amount: Decimal) -> String {
    Price::brl(amount).display()
}

/// Rounded percent off `original`, or `None` when there is no markdown.
#[must_use]
pub fn discount_percentage(price: Decimal, original: Decimal) -> Option<u32> {
    if original <= Decimal::ZERO || original <= price {
        return None;
    }
    ((original - price) / original * Decimal::ONE_HUNDRED)
        .round()
        .to_u32()
}

/// Everything the total depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingInput {
    pub subtotal: Decimal,
    /// Price of the shipping option the customer picked, if any.
    pub selected_shipping: Option<Decimal>,
    pub payment: PaymentMethod,
    /// Discount granted by a validated coupon.
    pub coupon_discount: Decimal,
}

/// Breakdown of an order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPricing {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub pix_discount: Decimal,
    pub coupon_discount: Decimal,
    pub total: Decimal,
}

impl OrderPricing {
    /// Compute the order breakdown.
    ///
    /// - shipping: the selected option's price; without a selection, free for
    ///   PIX and [`DEFAULT_SHIPPING_FEE`] otherwise
    /// - PIX discount: [`PIX_DISCOUNT_RATE`] of the subtotal
    /// - coupon discount: clamped to `[0, subtotal]`
    /// - total: `max(0, subtotal + shipping − pix − coupon)`
    #[must_use]
    pub fn compute(input: &PricingInput) -> Self {
        let subtotal = round_money(input.subtotal.max(Decimal::ZERO));
        let is_pix = input.payment == PaymentMethod::Pix;

        let shipping = match input.selected_shipping {
            Some(price) => round_money(price.max(Decimal::ZERO)),
            None if is_pix => Decimal::ZERO,
            None => DEFAULT_SHIPPING_FEE,
        };
        let pix_discount = if is_pix {
            round_money(subtotal * PIX_DISCOUNT_RATE)
        } else {
            Decimal::ZERO
        };
        let coupon_discount = round_money(input.coupon_discount.clamp(Decimal::ZERO, subtotal));

        let total = (subtotal + shipping - pix_discount - coupon_discount).max(Decimal::ZERO);

        Self {
            subtotal,
            shipping,
            pix_discount,
            coupon_discount,
            total,
        }
    }

    /// PIX and coupon discounts combined.
    #[must_use]
    pub fn discount(&self) -> Decimal {
        self.pix_discount + self.coupon_discount
    }
}
