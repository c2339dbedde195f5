//! Product listing with search, category filter and sort.

use std::cmp::Ordering;

use tracing::instrument;

use vitrine_core::{Category, ProductId};

use crate::backend::{BackendError, CatalogBackend};
use crate::models::Product;

/// Product list ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Best search match first; backend order without a search.
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    Name,
    /// Highest rated first, unrated last.
    Rating,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relevance => write!(f, "relevance"),
            Self::PriceAsc => write!(f, "price-asc"),
            Self::PriceDesc => write!(f, "price-desc"),
            Self::Name => write!(f, "name"),
            Self::Rating => write!(f, "rating"),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(Self::Relevance),
            "price-asc" => Ok(Self::PriceAsc),
            "price-desc" => Ok(Self::PriceDesc),
            "name" => Ok(Self::Name),
            "rating" => Ok(Self::Rating),
            _ => Err(format!("invalid sort order: {s}")),
        }
    }
}

/// Filters of the product listing, as carried in its query string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub sort: SortOrder,
}

impl ProductQuery {
    /// Parse `search=..&category=..&sort=..`. Unknown keys and invalid values
    /// are ignored.
    #[must_use]
    pub fn from_query_string(query: &str) -> Self {
        let mut parsed = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "search" | "q" => {
                    let value = value.trim();
                    if !value.is_empty() {
                        parsed.search = Some(value.to_string());
                    }
                }
                "category" => parsed.category = value.parse().ok(),
                "sort" => parsed.sort = value.parse().unwrap_or_default(),
                _ => {}
            }
        }
        parsed
    }

    /// Inverse of [`Self::from_query_string`]; empty when no filter is set.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        if let Some(search) = &self.search {
            serializer.append_pair("search", search);
        }
        if let Some(category) = self.category {
            serializer.append_pair("category", &category.to_string());
        }
        if self.sort != SortOrder::Relevance {
            serializer.append_pair("sort", &self.sort.to_string());
        }
        serializer.finish()
    }

    /// Filter and order `products`.
    #[must_use]
    pub fn apply(&self, products: Vec<Product>) -> Vec<Product> {
        let needle = self.search.as_deref().map(str::to_lowercase);
        let mut matches: Vec<(u8, Product)> = products
            .into_iter()
            .filter(|p| self.category.is_none_or(|c| p.category == c))
            .filter_map(|p| match &needle {
                Some(needle) => search_score(&p, needle).map(|score| (score, p)),
                None => Some((0, p)),
            })
            .collect();

        match self.sort {
            SortOrder::Relevance => matches.sort_by(|a, b| b.0.cmp(&a.0)),
            SortOrder::PriceAsc => matches.sort_by(|a, b| a.1.price.cmp(&b.1.price)),
            SortOrder::PriceDesc => matches.sort_by(|a, b| b.1.price.cmp(&a.1.price)),
            SortOrder::Name => {
                matches.sort_by(|a, b| a.1.name.to_lowercase().cmp(&b.1.name.to_lowercase()));
            }
            SortOrder::Rating => matches.sort_by(|a, b| compare_rating(b.1.rating, a.1.rating)),
        }
        matches.into_iter().map(|(_, p)| p).collect()
    }
}

/// Match strength of a product against a lower-cased search term.
fn search_score(product: &Product, needle: &str) -> Option<u8> {
    let name = product.name.to_lowercase();
    if name.starts_with(needle) {
        Some(3)
    } else if name.contains(needle) {
        Some(2)
    } else if product
        .description
        .as_deref()
        .is_some_and(|d| d.to_lowercase().contains(needle))
    {
        Some(1)
    } else {
        None
    }
}

fn compare_rating(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Reads the catalog.
#[derive(Debug, Clone)]
pub struct CatalogService<B> {
    backend: B,
}

impl<B: CatalogBackend> CatalogService<B> {
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Products matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &ProductQuery) -> Result<Vec<Product>, BackendError> {
        let products = self.backend.list_products().await?;
        Ok(query.apply(products))
    }

    /// One product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        self.backend.get_product(id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(name: &str, price: i64, category: Category, rating: Option<f64>) -> Product {
        Product {
            id: ProductId::generate(),
            name: name.to_string(),
            price: Decimal::new(price, 0),
            original_price: None,
            category,
            stock: 10,
            image_url: String::new(),
            description: Some(format!("{name} description")),
            rating,
        }
    }

    fn names(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.name.as_str()).collect()
    }

    fn catalog() -> Vec<Product> {
        vec![
            product("Smartwatch", 900, Category::Electronics, Some(4.2)),
            product("Fone Bluetooth", 250, Category::Electronics, Some(4.8)),
            product("Jaqueta", 300, Category::Clothing, None),
            product("Capa de fone", 40, Category::Accessories, Some(3.9)),
        ]
    }

    #[test]
    fn test_parse_query_string() {
        let query =
            ProductQuery::from_query_string("?search=fone&category=electronics&sort=price-desc");
        assert_eq!(query.search.as_deref(), Some("fone"));
        assert_eq!(query.category, Some(Category::Electronics));
        assert_eq!(query.sort, SortOrder::PriceDesc);

        let lenient = ProductQuery::from_query_string("sort=bogus&category=food&search=");
        assert_eq!(lenient, ProductQuery::default());
    }

    #[test]
    fn test_query_string_roundtrip() {
        let query = ProductQuery {
            search: Some("fone azul".to_string()),
            category: Some(Category::Accessories),
            sort: SortOrder::Rating,
        };
        assert_eq!(ProductQuery::from_query_string(&query.to_query_string()), query);
        assert_eq!(ProductQuery::default().to_query_string(), "");
    }

    #[test]
    fn test_search_relevance() {
        let query = ProductQuery::from_query_string("search=FONE");
        assert_eq!(names(&query.apply(catalog())), ["Fone Bluetooth", "Capa de fone"]);
    }

    #[test]
    fn test_category_and_price_sort() {
        let query = ProductQuery::from_query_string("category=electronics&sort=price-asc");
        assert_eq!(names(&query.apply(catalog())), ["Fone Bluetooth", "Smartwatch"]);
    }

    #[test]
    fn test_rating_sort_puts_unrated_last() {
        let query = ProductQuery::from_query_string("sort=rating");
        assert_eq!(
            names(&query.apply(catalog())),
            ["Fone Bluetooth", "Smartwatch", "Capa de fone", "Jaqueta"]
        );
    }

    #[test]
    fn test_name_sort() {
        let query = ProductQuery::from_query_string("sort=name");
        assert_eq!(
            names(&query.apply(catalog())),
            ["Capa de fone", "Fone Bluetooth", "Jaqueta", "Smartwatch"]
        );
    }
}
