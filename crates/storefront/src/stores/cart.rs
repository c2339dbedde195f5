//! Shopping cart.
//!
//! The cart is a list of unique `(product, quantity)` lines plus the drawer
//! visibility flag. Lines are persisted after every mutation; visibility is
//! not.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vitrine_core::ProductId;

use crate::models::Product;
use crate::storage::{self, SharedStore, keys};

/// One cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product snapshot taken when the line was added or last refreshed.
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// Why an add was refused. The cart is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartRejection {
    /// The product has no stock.
    OutOfStock,
    /// The line already holds every available unit.
    StockLimitReached { stock: u32 },
}

impl std::fmt::Display for CartRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfStock => write!(f, "Product is out of stock"),
            Self::StockLimitReached { stock } => {
                write!(f, "Only {stock} units available in stock")
            }
        }
    }
}

/// Result of [`CartStore::add_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The line now holds `quantity` units.
    Added { quantity: u32 },
    Rejected(CartRejection),
}

impl AddOutcome {
    #[must_use]
    pub const fn is_added(&self) -> bool {
        matches!(self, Self::Added { .. })
    }
}

/// Cart state machine backed by local storage.
pub struct CartStore {
    items: Vec<CartItem>,
    is_open: bool,
    store: SharedStore,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("items", &self.items)
            .field("is_open", &self.is_open)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Rehydrate the cart from local storage; unreadable data yields an empty cart.
    #[must_use]
    pub fn load(store: SharedStore) -> Self {
        let items = storage::load_or_default(store.as_ref(), keys::CART);
        Self {
            items,
            is_open: false,
            store,
        }
    }

    /// Re-read the persisted lines, discarding in-memory state.
    pub fn reload(&mut self) {
        self.items = storage::load_or_default(self.store.as_ref(), keys::CART);
    }

    fn save(&self) {
        storage::save_best_effort(self.store.as_ref(), keys::CART, &self.items);
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.is_open
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product`.
    ///
    /// Refused when the product is out of stock or the existing line already
    /// holds `stock` units.
    pub fn add_item(&mut self, product: &Product) -> AddOutcome {
        if product.stock == 0 {
            tracing::warn!(product_id = %product.id, "Add refused: out of stock");
            return AddOutcome::Rejected(CartRejection::OutOfStock);
        }

        let quantity = match self.items.iter_mut().find(|i| i.product.id == product.id) {
            Some(line) if line.quantity >= product.stock => {
                tracing::warn!(
                    product_id = %product.id,
                    stock = product.stock,
                    "Add refused: stock limit reached"
                );
                return AddOutcome::Rejected(CartRejection::StockLimitReached {
                    stock: product.stock,
                });
            }
            Some(line) => {
                line.quantity += 1;
                line.quantity
            }
            None => {
                self.items.push(CartItem {
                    product: product.clone(),
                    quantity: 1,
                });
                1
            }
        };

        self.save();
        AddOutcome::Added { quantity }
    }

    /// Remove a line; removing an absent product is a no-op.
    pub fn remove_item(&mut self, product_id: ProductId) {
        self.items.retain(|i| i.product.id != product_id);
        self.save();
    }

    /// Set a line's quantity verbatim; zero or less removes the line.
    ///
    /// Stock is not re-checked here. Callers clamp before calling.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(product_id);
            return;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(line) = self.items.iter_mut().find(|i| i.product.id == product_id) {
            line.quantity = quantity;
        }
        self.save();
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
        self.save();
    }

    pub const fn toggle_open(&mut self) {
        self.is_open = !self.is_open;
    }

    pub const fn set_open(&mut self, open: bool) {
        self.is_open = open;
    }

    /// Replace line snapshots with fresh catalog data.
    ///
    /// Quantities are left as they are, even above the new stock.
    pub fn refresh_stock(&mut self, products: &[Product]) {
        let mut changed = false;
        for line in &mut self.items {
            if let Some(fresh) = products.iter().find(|p| p.id == line.product.id)
                && *fresh != line.product
            {
                line.product = fresh.clone();
                changed = true;
            }
        }
        if changed {
            self.save();
        }
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Sum of `price × quantity`.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Quantity of `product_id` in the cart, 0 if absent.
    #[must_use]
    pub fn item_quantity(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|i| i.product.id == product_id)
            .map_or(0, |i| i.quantity)
    }
}
