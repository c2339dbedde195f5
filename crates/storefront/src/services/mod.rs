//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `catalog` - Product listing, search and sort
//! - `coupons` - Coupon validation and discount arithmetic
//! - `shipping` - Shipping quotes by postal code
//! - `orders` - Order placement, tracking, cancellation and realtime updates
//! - `admin` - Dashboard, status updates, stock and coupon management
//! - `chat` - Shopping assistant proxy client
//!
//! Services are generic over the backend traits they need and hold the
//! backend handle by value (it is cheap to clone).

pub mod admin;
pub mod catalog;
pub mod chat;
pub mod coupons;
pub mod orders;
pub mod shipping;

pub use admin::{AdminError, AdminService, Dashboard, LOW_STOCK_THRESHOLD};
pub use catalog::{CatalogService, ProductQuery, SortOrder};
pub use chat::{ChatClient, ChatError, ChatMessage};
pub use coupons::{AppliedCoupon, CouponOutcome, CouponRejection, CouponValidator};
pub use orders::{CheckoutDetails, OrderError, OrderService, OrderTracker, Reconciliation};
pub use shipping::{ShippingCalculator, ShippingError, ShippingOption, ShippingQuote};
