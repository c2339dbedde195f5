//! Domain models for the storefront.
//!
//! These mirror the rows the backend stores. Monetary fields are
//! [`rust_decimal::Decimal`] in reais; timestamps are UTC.

pub mod address;
pub mod coupon;
pub mod notification;
pub mod order;
pub mod product;
pub mod review;
pub mod user;

pub use address::ShippingAddress;
pub use coupon::{Coupon, DiscountType};
pub use notification::Notification;
pub use order::{NewOrder, Order, OrderItem, OrderStatusEvent};
pub use product::Product;
pub use review::{ImageUpload, Review, ReviewDraft};
pub use user::{Credentials, Session};
