//! Hosted backend-as-a-service access.
//!
//! # Architecture
//!
//! - The backend is the source of truth for products, stock, coupons, orders,
//!   favorites, users and uploaded files
//! - Each concern is a trait so services depend only on what they use
//! - [`Backend`] bundles every trait; services are generic over it
//!
//! # Implementations
//!
//! - [`InMemoryBackend`] - process-local tables with a realtime broadcast
//!   channel; snapshot/restore for the CLI demo mode and tests
//! - [`RestBackend`] - PostgREST-style HTTP API via `reqwest`, products cached
//!   with `moka`, realtime order updates by polling

mod memory;
mod rest;

pub use memory::{BackendSnapshot, InMemoryBackend, UserRecord};
pub use rest::RestBackend;

use std::future::Future;

use thiserror::Error;
use tokio::sync::broadcast;

use vitrine_core::{OrderId, OrderStatus, ProductId, UserId};

use crate::models::{
    Coupon, Credentials, ImageUpload, NewOrder, Order, OrderStatusEvent, Product, Session,
};

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Row not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing, expired or insufficient credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Email/password pair rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Write rejected because of a conflicting row or state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Payload rejected by a backend-side check.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Rate limited.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

/// Sign-in, sign-up and sign-out.
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a session.
    fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Session, BackendError>> + Send;

    /// Create an account and return its first session.
    fn sign_up(
        &self,
        credentials: &Credentials,
        display_name: &str,
    ) -> impl Future<Output = Result<Session, BackendError>> + Send;

    /// Revoke a session's access token.
    fn sign_out(&self, session: &Session) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Product table.
pub trait CatalogBackend: Send + Sync {
    /// All products, newest first.
    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, BackendError>> + Send;

    /// One product by id.
    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, BackendError>> + Send;

    /// Overwrite a product's stock count (admin only).
    fn set_stock(
        &self,
        session: &Session,
        id: ProductId,
        stock: u32,
    ) -> impl Future<Output = Result<Product, BackendError>> + Send;
}

/// Coupon table.
pub trait CouponBackend: Send + Sync {
    /// Look up an active coupon by its upper-cased code.
    fn find_active_coupon(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Coupon>, BackendError>> + Send;

    /// Record one use of a coupon.
    fn increment_coupon_usage(
        &self,
        session: &Session,
        code: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Create or replace a coupon (admin only).
    fn upsert_coupon(
        &self,
        session: &Session,
        coupon: Coupon,
    ) -> impl Future<Output = Result<Coupon, BackendError>> + Send;
}

/// Order table and its realtime feed.
pub trait OrderBackend: Send + Sync {
    /// Persist a new order for the session's user.
    fn create_order(
        &self,
        session: &Session,
        order: NewOrder,
    ) -> impl Future<Output = Result<Order, BackendError>> + Send;

    /// One order, if visible to the session.
    fn get_order(
        &self,
        session: &Session,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, BackendError>> + Send;

    /// The session user's orders, newest first.
    fn list_orders_for_user(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<Vec<Order>, BackendError>> + Send;

    /// Every order, newest first (admin only).
    fn list_all_orders(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<Vec<Order>, BackendError>> + Send;

    /// Set an order's status (admin only).
    fn update_order_status(
        &self,
        session: &Session,
        id: OrderId,
        status: OrderStatus,
    ) -> impl Future<Output = Result<Order, BackendError>> + Send;

    /// Cancel one of the session user's own orders while still cancellable.
    fn cancel_order(
        &self,
        session: &Session,
        id: OrderId,
    ) -> impl Future<Output = Result<Order, BackendError>> + Send;

    /// Subscribe to status changes of the session user's orders.
    fn subscribe_order_updates(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<OrderUpdates, BackendError>> + Send;
}

/// Favorites table.
pub trait FavoriteBackend: Send + Sync {
    /// Product ids a user has favorited.
    fn list_favorites(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<ProductId>, BackendError>> + Send;

    /// Add a favorite for the session user.
    fn add_favorite(
        &self,
        session: &Session,
        product_id: ProductId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Remove a favorite for the session user.
    fn remove_favorite(
        &self,
        session: &Session,
        product_id: ProductId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Object storage.
pub trait FileStorage: Send + Sync {
    /// Upload a file and return its public URL.
    fn upload(
        &self,
        session: &Session,
        bucket: &str,
        path: &str,
        file: &ImageUpload,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}

/// Everything the storefront needs from the backend.
pub trait Backend:
    AuthBackend
    + CatalogBackend
    + CouponBackend
    + OrderBackend
    + FavoriteBackend
    + FileStorage
    + Clone
    + 'static
{
}

impl<T> Backend for T where
    T: AuthBackend
        + CatalogBackend
        + CouponBackend
        + OrderBackend
        + FavoriteBackend
        + FileStorage
        + Clone
        + 'static
{
}

// =============================================================================
// Realtime
// =============================================================================

/// A subscription to one user's order status changes.
///
/// Events may be duplicated or missed (a lagging receiver skips ahead); the
/// consumer is expected to apply them idempotently.
#[derive(Debug)]
pub struct OrderUpdates {
    user_id: UserId,
    receiver: broadcast::Receiver<OrderStatusEvent>,
}

impl OrderUpdates {
    /// Wrap a broadcast receiver, keeping only `user_id`'s events.
    #[must_use]
    pub const fn new(user_id: UserId, receiver: broadcast::Receiver<OrderStatusEvent>) -> Self {
        Self { user_id, receiver }
    }

    /// Wait for the next event; `None` once the channel is closed.
    pub async fn next(&mut self) -> Option<OrderStatusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.user_id == self.user_id => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Realtime order feed lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drain every event already delivered, without waiting.
    pub fn drain(&mut self) -> Vec<OrderStatusEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.user_id == self.user_id => events.push(event),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Realtime order feed lagged, events dropped");
                }
                Err(_) => return events,
            }
        }
    }
}
