//! Coupon validation.
//!
//! The rules live in [`evaluate`], a pure function of the coupon record, the
//! subtotal and the clock. [`CouponValidator`] only adds the backend lookup, so
//! validating the same code twice against the same data gives the same answer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use vitrine_core::round_money;

use crate::backend::CouponBackend;
use crate::models::{Coupon, DiscountType};
use crate::pricing::format_price;

/// Why a coupon was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    EmptyCode,
    NotFound,
    NotYetValid,
    Expired,
    BelowMinimum { min_purchase: Decimal },
    Exhausted,
    /// The backend could not be reached.
    Unavailable,
}

impl std::fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCode => write!(f, "Enter a coupon code"),
            Self::NotFound => write!(f, "Invalid coupon"),
            Self::NotYetValid => write!(f, "This coupon is not valid yet"),
            Self::Expired => write!(f, "This coupon has expired"),
            Self::BelowMinimum { min_purchase } => {
                write!(f, "Minimum purchase of {}", format_price(*min_purchase))
            }
            Self::Exhausted => write!(f, "This coupon has reached its usage limit"),
            Self::Unavailable => write!(f, "Could not validate the coupon, try again"),
        }
    }
}

/// A coupon that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCoupon {
    /// Canonical (upper-case) code.
    pub code: String,
    pub discount: Decimal,
    pub message: String,
}

/// Result of validating a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponOutcome {
    Valid(AppliedCoupon),
    Invalid(CouponRejection),
}

/// Trim and upper-case a submitted code.
#[must_use]
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Discount a coupon grants on `subtotal`, never more than the subtotal.
#[must_use]
pub fn coupon_discount(coupon: &Coupon, subtotal: Decimal) -> Decimal {
    let subtotal = subtotal.max(Decimal::ZERO);
    let discount = match coupon.discount_type {
        DiscountType::Percentage => {
            let percent = coupon
                .discount_value
                .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
            subtotal * percent / Decimal::ONE_HUNDRED
        }
        DiscountType::Fixed => coupon.discount_value.max(Decimal::ZERO),
    };
    round_money(discount.min(subtotal))
}

/// Apply the validity rules to a coupon record.
#[must_use]
pub fn evaluate(coupon: &Coupon, subtotal: Decimal, now: DateTime<Utc>) -> CouponOutcome {
    let rejection = if !coupon.active {
        Some(CouponRejection::NotFound)
    } else if now < coupon.valid_from {
        Some(CouponRejection::NotYetValid)
    } else if coupon.valid_until.is_some_and(|until| now > until) {
        Some(CouponRejection::Expired)
    } else if let Some(min_purchase) = coupon.min_purchase
        && subtotal < min_purchase
    {
        Some(CouponRejection::BelowMinimum { min_purchase })
    } else if coupon.max_uses.is_some_and(|max| coupon.used_count >= max) {
        Some(CouponRejection::Exhausted)
    } else {
        None
    };
    if let Some(rejection) = rejection {
        return CouponOutcome::Invalid(rejection);
    }

    let discount = coupon_discount(coupon, subtotal);
    let code = normalize_code(&coupon.code);
    let message = match coupon.discount_type {
        DiscountType::Percentage => format!(
            "Coupon {code} applied: {}% off",
            coupon.discount_value.normalize()
        ),
        DiscountType::Fixed => {
            format!("Coupon {code} applied: {} off", format_price(discount))
        }
    };
    CouponOutcome::Valid(AppliedCoupon {
        code,
        discount,
        message,
    })
}

/// Validates codes against the backend's coupon table.
#[derive(Debug, Clone)]
pub struct CouponValidator<B> {
    backend: B,
}

impl<B: CouponBackend> CouponValidator<B> {
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Look up and evaluate a code. Never fails: backend errors become
    /// [`CouponRejection::Unavailable`].
    #[instrument(skip(self))]
    pub async fn validate(&self, raw_code: &str, subtotal: Decimal) -> CouponOutcome {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return CouponOutcome::Invalid(CouponRejection::EmptyCode);
        }

        let outcome = match self.backend.find_active_coupon(&code).await {
            Ok(Some(coupon)) => evaluate(&coupon, subtotal, Utc::now()),
            Ok(None) => CouponOutcome::Invalid(CouponRejection::NotFound),
            Err(e) => {
                tracing::error!(error = %e, "Coupon lookup failed");
                CouponOutcome::Invalid(CouponRejection::Unavailable)
            }
        };
        if let CouponOutcome::Invalid(rejection) = &outcome {
            tracing::warn!(code = %code, reason = %rejection, "Coupon rejected");
        }
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use vitrine_core::CouponId;

    use super::*;
    use crate::backend::InMemoryBackend;

    fn coupon(discount_type: DiscountType, value: i64) -> Coupon {
        Coupon {
            id: CouponId::generate(),
            code: "SAVE10".to_string(),
            discount_type,
            discount_value: Decimal::new(value, 0),
            min_purchase: None,
            max_uses: None,
            used_count: 0,
            valid_from: Utc::now() - Duration::days(1),
            valid_until: None,
            active: true,
        }
    }

    fn discount_of(outcome: &CouponOutcome) -> Decimal {
        match outcome {
            CouponOutcome::Valid(applied) => applied.discount,
            CouponOutcome::Invalid(r) => panic!("unexpected rejection: {r}"),
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  save10 "), "SAVE10");
    }

    #[test]
    fn test_percentage_discount() {
        let outcome = evaluate(
            &coupon(DiscountType::Percentage, 10),
            Decimal::new(200, 0),
            Utc::now(),
        );
        assert_eq!(discount_of(&outcome), Decimal::new(20, 0));
    }

    #[test]
    fn test_percentage_above_hundred_is_clamped() {
        let outcome = evaluate(
            &coupon(DiscountType::Percentage, 150),
            Decimal::new(80, 0),
            Utc::now(),
        );
        assert_eq!(discount_of(&outcome), Decimal::new(80, 0));
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let outcome = evaluate(
            &coupon(DiscountType::Fixed, 50),
            Decimal::new(30, 0),
            Utc::now(),
        );
        assert_eq!(discount_of(&outcome), Decimal::new(30, 0));
    }

    #[test]
    fn test_rejections() {
        let now = Utc::now();
        let subtotal = Decimal::new(100, 0);

        let mut future = coupon(DiscountType::Fixed, 10);
        future.valid_from = now + Duration::days(1);
        assert_eq!(
            evaluate(&future, subtotal, now),
            CouponOutcome::Invalid(CouponRejection::NotYetValid)
        );

        let mut expired = coupon(DiscountType::Fixed, 10);
        expired.valid_until = Some(now - Duration::hours(1));
        assert_eq!(
            evaluate(&expired, subtotal, now),
            CouponOutcome::Invalid(CouponRejection::Expired)
        );

        let mut minimum = coupon(DiscountType::Fixed, 10);
        minimum.min_purchase = Some(Decimal::new(150, 0));
        assert_eq!(
            evaluate(&minimum, subtotal, now),
            CouponOutcome::Invalid(CouponRejection::BelowMinimum {
                min_purchase: Decimal::new(150, 0)
            })
        );

        let mut used_up = coupon(DiscountType::Fixed, 10);
        used_up.max_uses = Some(3);
        used_up.used_count = 3;
        assert_eq!(
            evaluate(&used_up, subtotal, now),
            CouponOutcome::Invalid(CouponRejection::Exhausted)
        );
    }

    #[tokio::test]
    async fn test_validation_is_idempotent() {
        let backend = InMemoryBackend::new();
        backend.insert_coupon(coupon(DiscountType::Percentage, 10));
        let validator = CouponValidator::new(backend);

        let first = validator.validate("save10", Decimal::new(200, 0)).await;
        let second = validator.validate("SAVE10 ", Decimal::new(200, 0)).await;
        assert_eq!(first, second);
        let CouponOutcome::Valid(applied) = first else {
            panic!("coupon should be valid");
        };
        assert_eq!(applied.code, "SAVE10");
        assert_eq!(applied.discount, Decimal::new(20, 0));
    }

    #[tokio::test]
    async fn test_unknown_and_empty_codes() {
        let validator = CouponValidator::new(InMemoryBackend::new());
        assert_eq!(
            validator.validate("NOPE", Decimal::new(10, 0)).await,
            CouponOutcome::Invalid(CouponRejection::NotFound)
        );
        assert_eq!(
            validator.validate("   ", Decimal::new(10, 0)).await,
            CouponOutcome::Invalid(CouponRejection::EmptyCode)
        );
    }
}
