//! Integration tests for Vitrine.
//!
//! The tests drive a [`Storefront`] end to end against the in-memory
//! backend, so they need no network or database.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p vitrine-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Cart to confirmed order, pricing and coupons
//! - `cart_persistence` - Local state across restarts
//! - `order_tracking` - Status changes, realtime notifications, cancellation

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::SecretString;

use vitrine_core::{Category, CouponId, Email, ProductId, UserRole};
use vitrine_storefront::Storefront;
use vitrine_storefront::backend::{AuthBackend, InMemoryBackend};
use vitrine_storefront::checkout::AddressForm;
use vitrine_storefront::config::StorefrontConfig;
use vitrine_storefront::models::{Coupon, Credentials, DiscountType, Product, Session};
use vitrine_storefront::storage::{MemoryStore, SharedStore};

pub const PASSWORD: &str = "correct-horse";

/// A seeded backend plus an admin session and a local store.
pub struct TestContext {
    pub backend: InMemoryBackend,
    pub store: SharedStore,
    pub admin: Session,
    pub headphones: Product,
    pub tshirt: Product,
}

impl TestContext {
    /// Seed two products, the `SAVE10` and `BIG50` coupons and an admin.
    pub async fn new() -> Self {
        let backend = InMemoryBackend::new();

        let headphones = product("Fone Bluetooth", Decimal::new(100, 0), Category::Electronics, 5);
        let tshirt = product("Camiseta Básica", Decimal::new(4990, 2), Category::Clothing, 20);
        backend.insert_product(headphones.clone());
        backend.insert_product(tshirt.clone());

        backend.insert_coupon(coupon("SAVE10", DiscountType::Percentage, 10, None));
        backend.insert_coupon(coupon(
            "BIG50",
            DiscountType::Fixed,
            50,
            Some(Decimal::new(300, 0)),
        ));

        backend
            .register_user(&email("admin@vitrine.dev"), PASSWORD, "Admin", UserRole::Admin)
            .unwrap();
        let admin = backend
            .sign_in(&credentials("admin@vitrine.dev"))
            .await
            .unwrap();

        Self {
            backend,
            store: MemoryStore::shared(),
            admin,
            headphones,
            tshirt,
        }
    }

    /// A storefront over the shared backend and local store.
    pub fn storefront(&self) -> Storefront<InMemoryBackend> {
        Storefront::new(self.backend.clone(), self.store.clone(), &config()).unwrap()
    }

    /// A storefront with its own local store, signed up as a new customer.
    pub async fn customer(&self, address: &str, name: &str) -> Storefront<InMemoryBackend> {
        let mut storefront =
            Storefront::new(self.backend.clone(), MemoryStore::shared(), &config()).unwrap();
        storefront
            .sign_up(&credentials(address), name)
            .await
            .unwrap();
        storefront
    }

    /// Current stock of a product in the backend.
    pub fn stock_of(&self, id: ProductId) -> u32 {
        self.backend
            .snapshot()
            .products
            .iter()
            .find(|p| p.id == id)
            .map_or(0, |p| p.stock)
    }
}

/// Configuration without artificial delays.
pub fn config() -> StorefrontConfig {
    StorefrontConfig {
        payment_delay: Duration::ZERO,
        shipping_delay: Duration::ZERO,
        ..StorefrontConfig::default()
    }
}

pub fn email(address: &str) -> Email {
    Email::parse(address).unwrap()
}

pub fn credentials(address: &str) -> Credentials {
    Credentials {
        email: email(address),
        password: SecretString::from(PASSWORD),
    }
}

pub fn product(name: &str, price: Decimal, category: Category, stock: u32) -> Product {
    Product {
        id: ProductId::generate(),
        name: name.to_string(),
        price,
        original_price: None,
        category,
        stock,
        image_url: format!("/images/{}.jpg", name.to_lowercase().replace(' ', "-")),
        description: None,
        rating: Some(4.5),
    }
}

pub fn coupon(
    code: &str,
    discount_type: DiscountType,
    value: i64,
    min_purchase: Option<Decimal>,
) -> Coupon {
    Coupon {
        id: CouponId::generate(),
        code: code.to_string(),
        discount_type,
        discount_value: Decimal::new(value, 0),
        min_purchase,
        max_uses: None,
        used_count: 0,
        valid_from: Utc::now() - chrono::Duration::days(1),
        valid_until: Some(Utc::now() + chrono::Duration::days(30)),
        active: true,
    }
}

/// A valid São Paulo address.
pub fn address() -> AddressForm {
    AddressForm {
        full_name: "Ana Souza".to_string(),
        email: "ana@example.com".to_string(),
        phone: "(11) 98765-4321".to_string(),
        postal_code: "01310-100".to_string(),
        street: "Avenida Paulista".to_string(),
        number: "1578".to_string(),
        complement: String::new(),
        neighborhood: "Bela Vista".to_string(),
        city: "São Paulo".to_string(),
        state: "SP".to_string(),
    }
}
