//! Vitrine Core - Shared value types.
//!
//! This crate provides the value types used across all Vitrine components:
//! - `storefront` - Client-side stores, pricing and backend access
//! - `cli` - Command-line driver for the storefront
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no backend access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, contact data and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
