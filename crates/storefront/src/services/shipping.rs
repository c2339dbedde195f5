//! Shipping quotes by postal code (CEP).
//!
//! The CEP's numeric value picks one of seven regional tables; each table
//! yields four delivery tiers. Quotes are computed locally and recomputed on
//! every request.

use std::ops::RangeInclusive;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vitrine_core::PostalCode;

use crate::pricing::format_price;

/// A deliverable shipping option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub min_days: u32,
    pub max_days: u32,
}

impl ShippingOption {
    /// e.g. `"2-4 business days"`.
    #[must_use]
    pub fn delivery_estimate(&self) -> String {
        if self.max_days <= 1 {
            "1 business day".to_string()
        } else if self.min_days == self.max_days {
            format!("{} business days", self.min_days)
        } else {
            format!("{}-{} business days", self.min_days, self.max_days)
        }
    }
}

impl std::fmt::Display for ShippingOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {} ({})",
            self.name,
            format_price(self.price),
            self.delivery_estimate()
        )
    }
}

/// Why no options could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShippingError {
    #[error("postal code must have 8 digits, got {digits}")]
    InvalidPostalCode { digits: usize },

    #[error("no delivery to this postal code")]
    UnknownRegion,
}

/// Outcome of [`ShippingCalculator::calculate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShippingQuote {
    Options(Vec<ShippingOption>),
    Invalid(ShippingError),
}

struct Region {
    name: &'static str,
    ranges: &'static [RangeInclusive<u32>],
    /// Economic tier price, in cents.
    base_cents: i64,
    min_days: u32,
    max_days: u32,
}

const REGIONS: &[Region] = &[
    Region {
        name: "SP",
        ranges: &[1_000_000..=19_999_999],
        base_cents: 1590,
        min_days: 2,
        max_days: 4,
    },
    Region {
        name: "RJ/ES",
        ranges: &[20_000_000..=29_999_999],
        base_cents: 1890,
        min_days: 3,
        max_days: 5,
    },
    Region {
        name: "MG",
        ranges: &[30_000_000..=39_999_999],
        base_cents: 1990,
        min_days: 3,
        max_days: 6,
    },
    Region {
        name: "Nordeste",
        ranges: &[40_000_000..=65_999_999],
        base_cents: 2790,
        min_days: 6,
        max_days: 10,
    },
    Region {
        name: "Norte",
        ranges: &[66_000_000..=69_999_999, 77_000_000..=77_999_999],
        base_cents: 3290,
        min_days: 8,
        max_days: 14,
    },
    Region {
        name: "Centro-Oeste",
        ranges: &[70_000_000..=76_999_999, 78_000_000..=79_999_999],
        base_cents: 2490,
        min_days: 5,
        max_days: 8,
    },
    Region {
        name: "Sul",
        ranges: &[80_000_000..=99_999_999],
        base_cents: 2190,
        min_days: 4,
        max_days: 7,
    },
];

struct Tier {
    id: &'static str,
    name: &'static str,
    extra_cents: i64,
    fewer_days: u32,
}

const TIERS: &[Tier] = &[
    Tier {
        id: "economic",
        name: "Economic",
        extra_cents: 0,
        fewer_days: 0,
    },
    Tier {
        id: "standard",
        name: "Standard",
        extra_cents: 700,
        fewer_days: 2,
    },
    Tier {
        id: "express",
        name: "Express",
        extra_cents: 1500,
        fewer_days: 4,
    },
    Tier {
        id: "super-express",
        name: "Super Express",
        extra_cents: 2800,
        fewer_days: 6,
    },
];

/// Keep only the digits of a postal code.
#[must_use]
pub fn clean_postal_code(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Shipping options for a postal code, cheapest first.
///
/// # Errors
///
/// Returns an error if the code does not have 8 digits or falls outside every
/// delivery region.
pub fn quote(raw_postal_code: &str) -> Result<Vec<ShippingOption>, ShippingError> {
    let digits = clean_postal_code(raw_postal_code);
    let postal_code = PostalCode::parse(&digits).map_err(|_| ShippingError::InvalidPostalCode {
        digits: digits.len(),
    })?;
    let value = postal_code.value();

    let region = REGIONS
        .iter()
        .find(|r| r.ranges.iter().any(|range| range.contains(&value)))
        .ok_or(ShippingError::UnknownRegion)?;
    tracing::debug!(postal_code = %postal_code, region = region.name, "Shipping region");

    Ok(TIERS
        .iter()
        .map(|tier| ShippingOption {
            id: tier.id.to_string(),
            name: tier.name.to_string(),
            price: Decimal::new(region.base_cents + tier.extra_cents, 2),
            min_days: region.min_days.saturating_sub(tier.fewer_days).max(1),
            max_days: region.max_days.saturating_sub(tier.fewer_days).max(1),
        })
        .collect())
}

/// Produces quotes with a simulated network delay.
#[derive(Debug, Clone, Copy)]
pub struct ShippingCalculator {
    delay: Duration,
}

impl ShippingCalculator {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Wait out the simulated latency, then quote. Bad input is reported as
    /// [`ShippingQuote::Invalid`].
    pub async fn calculate(&self, raw_postal_code: &str) -> ShippingQuote {
        tokio::time::sleep(self.delay).await;
        match quote(raw_postal_code) {
            Ok(options) => ShippingQuote::Options(options),
            Err(e) => {
                tracing::warn!(error = %e, "Shipping quote refused");
                ShippingQuote::Invalid(e)
            }
        }
    }
}
