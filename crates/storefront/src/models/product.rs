//! Catalog product.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vitrine_core::{Category, ProductId};

use crate::pricing;

/// A product as listed in the catalog.
///
/// Read-only from the storefront's point of view; `stock` is owned by the
/// backend and only read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Current unit price.
    pub price: Decimal,
    /// Pre-discount price, shown struck through when higher than `price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    pub category: Category,
    pub stock: u32,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl Product {
    /// Whether at least one unit is available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Percent off the original price, if the product is on sale.
    #[must_use]
    pub fn discount_percentage(&self) -> Option<u32> {
        self.original_price
            .and_then(|original| pricing::discount_percentage(self.price, original))
    }
}
