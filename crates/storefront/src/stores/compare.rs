//! Product comparison list. Works without signing in.

use vitrine_core::ProductId;

use crate::models::Product;
use crate::storage::{self, SharedStore, keys};

/// Most products that can be compared side by side.
pub const MAX_COMPARE: usize = 4;

/// Why a product was not added to the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareRejection {
    AlreadyAdded,
    Full { max: usize },
}

impl std::fmt::Display for CompareRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyAdded => write!(f, "Product is already in the comparison"),
            Self::Full { max } => write!(f, "You can compare at most {max} products"),
        }
    }
}

/// Products picked for comparison, in insertion order.
pub struct CompareList {
    products: Vec<Product>,
    store: SharedStore,
}

impl std::fmt::Debug for CompareList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompareList")
            .field("products", &self.products.len())
            .finish_non_exhaustive()
    }
}

impl CompareList {
    #[must_use]
    pub fn load(store: SharedStore) -> Self {
        let mut products: Vec<Product> = storage::load_or_default(store.as_ref(), keys::COMPARE);
        products.truncate(MAX_COMPARE);
        Self { products, store }
    }

    fn save(&self) {
        storage::save_best_effort(self.store.as_ref(), keys::COMPARE, &self.products);
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.products.iter().any(|p| p.id == product_id)
    }

    /// Add a product to the comparison.
    ///
    /// # Errors
    ///
    /// Rejects duplicates and additions beyond [`MAX_COMPARE`]; the list is
    /// unchanged in both cases.
    pub fn add(&mut self, product: &Product) -> Result<(), CompareRejection> {
        if self.contains(product.id) {
            return Err(CompareRejection::AlreadyAdded);
        }
        if self.products.len() >= MAX_COMPARE {
            return Err(CompareRejection::Full { max: MAX_COMPARE });
        }
        self.products.push(product.clone());
        self.save();
        Ok(())
    }

    pub fn remove(&mut self, product_id: ProductId) {
        self.products.retain(|p| p.id != product_id);
        self.save();
    }

    pub fn clear(&mut self) {
        self.products.clear();
        self.save();
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use vitrine_core::Category;

    use super::*;
    use crate::storage::MemoryStore;

    fn product(name: &str) -> Product {
        Product {
            id: ProductId::generate(),
            name: name.to_string(),
            price: Decimal::new(99, 0),
            original_price: None,
            category: Category::Accessories,
            stock: 3,
            image_url: String::new(),
            description: None,
            rating: None,
        }
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut list = CompareList::load(MemoryStore::shared());
        let p = product("Relógio");
        assert_eq!(list.add(&p), Ok(()));
        assert_eq!(list.add(&p), Err(CompareRejection::AlreadyAdded));
        assert_eq!(list.products().len(), 1);
    }

    #[test]
    fn test_rejects_fifth_product() {
        let mut list = CompareList::load(MemoryStore::shared());
        for name in ["a", "b", "c", "d"] {
            assert_eq!(list.add(&product(name)), Ok(()));
        }
        let extra = product("e");
        assert_eq!(
            list.add(&extra),
            Err(CompareRejection::Full { max: MAX_COMPARE })
        );
        assert!(!list.contains(extra.id));
    }

    #[test]
    fn test_persists_between_loads() {
        let store = MemoryStore::shared();
        let mut list = CompareList::load(store.clone());
        let p = product("Bolsa");
        list.add(&p).ok();

        let reloaded = CompareList::load(store.clone());
        assert!(reloaded.contains(p.id));

        list.remove(p.id);
        assert!(CompareList::load(store).products().is_empty());
    }
}
