//! Admin dashboard and back-office operations.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use vitrine_core::{OrderId, OrderStatus, ProductId};

use crate::backend::{BackendError, CatalogBackend, CouponBackend, OrderBackend};
use crate::models::{Coupon, Order, Product, Session};
use crate::services::coupons::normalize_code;

/// Products at or below this stock count are flagged on the dashboard.
pub const LOW_STOCK_THRESHOLD: u32 = 5;

/// Errors that can occur in admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("admin access required")]
    Forbidden,

    #[error("order not found")]
    OrderNotFound,

    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("invalid coupon: {0}")]
    InvalidCoupon(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Figures shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    /// Sum of the totals of non-cancelled orders.
    pub revenue: Decimal,
    pub order_count: usize,
    /// Count per status, in [`OrderStatus::ALL`] order.
    pub orders_by_status: Vec<(OrderStatus, usize)>,
    /// Products with stock at or below [`LOW_STOCK_THRESHOLD`], lowest first.
    pub low_stock: Vec<Product>,
    /// Up to ten most recent orders.
    pub recent_orders: Vec<Order>,
}

impl Dashboard {
    /// Aggregate the dashboard from raw rows; `orders` newest first.
    #[must_use]
    pub fn build(orders: Vec<Order>, products: Vec<Product>) -> Self {
        let revenue = orders
            .iter()
            .filter(|order| order.status != OrderStatus::Cancelled)
            .map(|order| order.total)
            .sum();
        let orders_by_status = OrderStatus::ALL
            .iter()
            .map(|status| {
                let count = orders.iter().filter(|o| o.status == *status).count();
                (*status, count)
            })
            .collect();

        let mut low_stock: Vec<Product> = products
            .into_iter()
            .filter(|p| p.stock <= LOW_STOCK_THRESHOLD)
            .collect();
        low_stock.sort_by_key(|p| p.stock);

        let order_count = orders.len();
        let recent_orders = orders.into_iter().take(10).collect();

        Self {
            revenue,
            order_count,
            orders_by_status,
            low_stock,
            recent_orders,
        }
    }
}

/// Back-office operations; every call requires an admin session.
#[derive(Debug, Clone)]
pub struct AdminService<B> {
    backend: B,
}

fn require_admin(session: &Session) -> Result<(), AdminError> {
    if session.is_admin() {
        Ok(())
    } else {
        Err(AdminError::Forbidden)
    }
}

impl<B: OrderBackend + CatalogBackend + CouponBackend> AdminService<B> {
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Aggregate orders and stock for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Forbidden`] for non-admins, or the backend error.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn dashboard(&self, session: &Session) -> Result<Dashboard, AdminError> {
        require_admin(session)?;
        let orders = self.backend.list_all_orders(session).await?;
        let products = self.backend.list_products().await?;
        Ok(Dashboard::build(orders, products))
    }

    /// Every order, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Forbidden`] for non-admins, or the backend error.
    pub async fn list_orders(
        &self,
        session: &Session,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, AdminError> {
        require_admin(session)?;
        let orders = self.backend.list_all_orders(session).await?;
        Ok(orders
            .into_iter()
            .filter(|order| status.is_none_or(|s| order.status == s))
            .collect())
    }

    /// Move an order forward along its status machine.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::InvalidTransition`] for backward, repeated or
    /// terminal transitions.
    #[instrument(skip(self, session))]
    pub async fn update_order_status(
        &self,
        session: &Session,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, AdminError> {
        require_admin(session)?;
        let order = self
            .backend
            .get_order(session, order_id)
            .await?
            .ok_or(AdminError::OrderNotFound)?;
        if !order.status.can_transition_to(status) {
            tracing::warn!(from = %order.status, to = %status, "Status transition refused");
            return Err(AdminError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }
        let updated = self
            .backend
            .update_order_status(session, order_id, status)
            .await?;
        tracing::info!(order_id = %order_id, status = %status, "Order status updated");
        Ok(updated)
    }

    /// Overwrite a product's stock count.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Forbidden`] for non-admins, or the backend error.
    #[instrument(skip(self, session))]
    pub async fn set_stock(
        &self,
        session: &Session,
        product_id: ProductId,
        stock: u32,
    ) -> Result<Product, AdminError> {
        require_admin(session)?;
        let product = self.backend.set_stock(session, product_id, stock).await?;
        tracing::info!(product_id = %product_id, stock, "Stock updated");
        Ok(product)
    }

    /// Create or replace a coupon; the code is stored upper-cased.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::InvalidCoupon`] for an empty code, a negative
    /// value or an inverted validity window.
    #[instrument(skip(self, session, coupon), fields(code = %coupon.code))]
    pub async fn upsert_coupon(
        &self,
        session: &Session,
        mut coupon: Coupon,
    ) -> Result<Coupon, AdminError> {
        require_admin(session)?;
        coupon.code = normalize_code(&coupon.code);
        if coupon.code.is_empty() {
            return Err(AdminError::InvalidCoupon("code is empty".to_string()));
        }
        if coupon.discount_value < Decimal::ZERO {
            return Err(AdminError::InvalidCoupon(
                "discount value is negative".to_string(),
            ));
        }
        if coupon
            .valid_until
            .is_some_and(|until| until < coupon.valid_from)
        {
            return Err(AdminError::InvalidCoupon(
                "validity ends before it starts".to_string(),
            ));
        }
        Ok(self.backend.upsert_coupon(session, coupon).await?)
    }
}
