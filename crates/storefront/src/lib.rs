//! Vitrine Storefront library.
//!
//! Client-side state and business rules of the Vitrine shop: cart, coupons,
//! shipping quotes, checkout, orders, favorites, notifications, compare list,
//! reviews and the admin dashboard. Persistence, auth and file storage belong
//! to a hosted backend reached through the traits in [`backend`].
//!
//! # Modules
//!
//! - [`backend`] - Backend traits, in-memory and REST implementations
//! - [`checkout`] - Address → payment → confirmation state machine
//! - [`config`] - Environment configuration
//! - [`error`] - Unified error type and Sentry helpers
//! - [`models`] - Domain records
//! - [`pricing`] - Price display and order total arithmetic
//! - [`routes`] - Storefront paths
//! - [`services`] - Catalog, coupons, shipping, orders, admin and chat
//! - [`state`] - [`Storefront`](state::Storefront), the composition root
//! - [`storage`] - Local persisted key/value state
//! - [`stores`] - Cart, compare, favorites, notifications, reviews, history

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod checkout;
pub mod config;
pub mod error;
pub mod models;
pub mod pricing;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod stores;

pub use error::AppError;
pub use state::Storefront;
