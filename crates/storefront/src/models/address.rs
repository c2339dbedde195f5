//! Shipping address.

use serde::{Deserialize, Serialize};

use vitrine_core::{Email, Phone, PostalCode};

/// A validated shipping address attached to an order.
///
/// Built by the checkout address step; every field has already passed
/// validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub email: Email,
    pub phone: Phone,
    pub postal_code: PostalCode,
    pub street: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    /// Two-letter state code (UF), upper-case.
    pub state: String,
}

impl ShippingAddress {
    /// Single-line rendering, e.g. `Av. Paulista, 1000 - Bela Vista, São Paulo/SP, 01310-100`.
    #[must_use]
    pub fn one_line(&self) -> String {
        let complement = self
            .complement
            .as_deref()
            .map(|c| format!(" ({c})"))
            .unwrap_or_default();
        format!(
            "{}, {}{complement} - {}, {}/{}, {}",
            self.street, self.number, self.neighborhood, self.city, self.state, self.postal_code
        )
    }
}
