//! Seed the demo backend from a YAML catalog.
//!
//! ```yaml
//! products:
//!   - name: Fone Bluetooth
//!     price: "199.90"
//!     original_price: "249.90"
//!     category: electronics
//!     stock: 12
//!     image_url: /images/fone.jpg
//! coupons:
//!   - code: BEMVINDO10
//!     discount_type: percentage
//!     discount_value: "10"
//!     valid_days: 90
//! users:
//!   - email: admin@vitrine.dev
//!     password: trocar-esta-senha
//!     name: Admin
//!     role: admin
//! ```
//!
//! Seeding is repeatable: products are matched by name, coupons by code and
//! existing users are skipped.

use std::path::Path;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use vitrine_core::{Category, CouponId, Email, ProductId, UserRole};
use vitrine_storefront::backend::{BackendError, InMemoryBackend};
use vitrine_storefront::models::{Coupon, DiscountType, Product};

use super::CommandResult;

/// Contents of a catalog file.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub coupons: Vec<SeedCoupon>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    pub category: Category,
    pub stock: u32,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_purchase: Option<Decimal>,
    #[serde(default)]
    pub max_uses: Option<u32>,
    /// Days from seeding until expiry; no expiry when absent.
    #[serde(default)]
    pub valid_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Counts of what a seed run wrote.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: usize,
    pub coupons: usize,
    pub users: usize,
    pub skipped_users: usize,
}

/// Apply a parsed catalog to the backend.
///
/// # Errors
///
/// Returns an error for an invalid user email or password.
pub fn apply(
    backend: &InMemoryBackend,
    seed: SeedFile,
) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let existing = backend.snapshot();
    let mut summary = SeedSummary::default();

    for item in seed.products {
        let id = existing
            .products
            .iter()
            .find(|p| p.name == item.name)
            .map_or_else(ProductId::generate, |p| p.id);
        backend.insert_product(Product {
            id,
            name: item.name,
            price: item.price,
            original_price: item.original_price,
            category: item.category,
            stock: item.stock,
            image_url: item.image_url,
            description: item.description,
            rating: item.rating,
        });
        summary.products += 1;
    }

    let now = Utc::now();
    for item in seed.coupons {
        let code = item.code.trim().to_uppercase();
        let previous = existing.coupons.iter().find(|c| c.code == code);
        backend.insert_coupon(Coupon {
            id: previous.map_or_else(CouponId::generate, |c| c.id),
            code,
            discount_type: item.discount_type,
            discount_value: item.discount_value,
            min_purchase: item.min_purchase,
            max_uses: item.max_uses,
            used_count: previous.map_or(0, |c| c.used_count),
            valid_from: now,
            valid_until: item.valid_days.map(|days| now + Duration::days(days)),
            active: true,
        });
        summary.coupons += 1;
    }

    for user in seed.users {
        let email = Email::parse(&user.email)?;
        match backend.register_user(&email, &user.password, &user.name, user.role) {
            Ok(_) => summary.users += 1,
            Err(BackendError::Conflict(_)) => {
                warn!(email = %email, "User already exists, skipping");
                summary.skipped_users += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(summary)
}

/// Seed the backend from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn catalog(backend: &InMemoryBackend, path: &Path) -> CommandResult {
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()).into());
    }
    info!(path = %path.display(), "Loading catalog");

    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    let summary = apply(backend, seed)?;

    println!(
        "Seeded {} products, {} coupons, {} users ({} already existed)",
        summary.products, summary.coupons, summary.users, summary.skipped_users
    );
    Ok(())
}
