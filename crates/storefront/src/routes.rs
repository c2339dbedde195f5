//! Storefront routes.
//!
//! Every screen has a path; deep links in notifications and shared wishlists
//! are rendered with [`Route`]'s `Display` and parsed back with
//! [`Route::parse`].

use std::fmt;

use vitrine_core::{OrderId, ProductId};

use crate::services::catalog::ProductQuery;

/// A storefront location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Products(ProductQuery),
    Product(ProductId),
    Checkout,
    Order(OrderId),
    Profile,
    Wishlist,
    /// Someone else's wishlist, by share code.
    SharedWishlist(String),
    Admin,
    Faq,
}

impl Route {
    /// Parse a path with optional query string. Unknown paths return `None`.
    #[must_use]
    pub fn parse(path_and_query: &str) -> Option<Self> {
        let (path, query) = path_and_query
            .split_once('?')
            .unwrap_or((path_and_query, ""));
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let route = match segments.as_slice() {
            [] => Self::Home,
            ["products"] => Self::Products(ProductQuery::from_query_string(query)),
            ["product", id] => Self::Product(id.parse().ok()?),
            ["checkout"] => Self::Checkout,
            ["order", id] => Self::Order(id.parse().ok()?),
            ["profile"] => Self::Profile,
            ["wishlist"] => Self::Wishlist,
            ["wishlist", code] => Self::SharedWishlist((*code).to_string()),
            ["admin"] => Self::Admin,
            ["faq"] => Self::Faq,
            _ => return None,
        };
        Some(route)
    }

    /// Whether the screen needs a signed-in user.
    #[must_use]
    pub const fn requires_session(&self) -> bool {
        matches!(
            self,
            Self::Checkout | Self::Order(_) | Self::Profile | Self::Wishlist | Self::Admin
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "/"),
            Self::Products(query) => {
                let query = query.to_query_string();
                if query.is_empty() {
                    write!(f, "/products")
                } else {
                    write!(f, "/products?{query}")
                }
            }
            Self::Product(id) => write!(f, "/product/{id}"),
            Self::Checkout => write!(f, "/checkout"),
            Self::Order(id) => write!(f, "/order/{id}"),
            Self::Profile => write!(f, "/profile"),
            Self::Wishlist => write!(f, "/wishlist"),
            Self::SharedWishlist(code) => write!(f, "/wishlist/{code}"),
            Self::Admin => write!(f, "/admin"),
            Self::Faq => write!(f, "/faq"),
        }
    }
}
