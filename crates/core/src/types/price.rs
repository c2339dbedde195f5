//! Type-safe price representation using decimal arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round a monetary amount to cents.
///
/// Midpoints round away from zero, matching how the backend stores `numeric(10,2)`.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., reais, not centavos).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in Brazilian reais.
    #[must_use]
    pub const fn brl(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::BRL)
    }

    /// Format for display, e.g. `R$ 1.234,56` or `$1,234.56`.
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = round_money(self.amount);
        let fixed = format!("{:.2}", rounded.abs());
        let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

        let (group_sep, decimal_sep) = self.currency_code.separators();
        let grouped = group_thousands(int_part, group_sep);
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };

        format!(
            "{sign}{}{grouped}{decimal_sep}{frac_part}",
            self.currency_code.prefix()
        )
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    BRL,
    USD,
    EUR,
}

impl CurrencyCode {
    /// Display prefix including any trailing space.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::BRL => "R$ ",
            Self::USD => "$",
            Self::EUR => "€ ",
        }
    }

    /// Thousands and decimal separators.
    const fn separators(self) -> (char, char) {
        match self {
            Self::BRL | Self::EUR => ('.', ','),
            Self::USD => (',', '.'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_display_brl() {
        let price = Price::brl(Decimal::new(123_456, 2));
        assert_eq!(price.display(), "R$ 1.234,56");
    }

    #[test]
    fn test_display_small_amount() {
        assert_eq!(Price::brl(Decimal::new(5, 1)).display(), "R$ 0,50");
        assert_eq!(Price::brl(Decimal::ZERO).display(), "R$ 0,00");
    }

    #[test]
    fn test_display_millions() {
        let price = Price::brl(Decimal::new(1_234_567_890, 2));
        assert_eq!(price.display(), "R$ 12.345.678,90");
    }

    #[test]
    fn test_display_usd() {
        let price = Price::new(Decimal::new(99_999, 2), CurrencyCode::USD);
        assert_eq!(price.display(), "$999.99");
        let price = Price::new(Decimal::new(100_000, 2), CurrencyCode::USD);
        assert_eq!(price.display(), "$1,000.00");
    }

    #[test]
    fn test_display_negative() {
        assert_eq!(Price::brl(Decimal::new(-1050, 2)).display(), "-R$ 10,50");
    }

    #[test]
    fn test_round_money_midpoint() {
        assert_eq!(round_money(Decimal::new(10_005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_money(Decimal::new(10_004, 3)), Decimal::new(1000, 2));
    }
}
