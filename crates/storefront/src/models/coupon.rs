//! Discount coupons.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vitrine_core::CouponId;

/// How a coupon's `discount_value` is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` percent of the subtotal.
    Percentage,
    /// `discount_value` reais off, never more than the subtotal.
    Fixed,
}

/// A coupon record as stored by the backend.
///
/// Codes are unique and compared case-insensitively; they are stored upper-cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_purchase: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    #[serde(default)]
    pub used_count: u32,
    pub valid_from: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    pub active: bool,
}
