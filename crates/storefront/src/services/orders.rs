//! Order placement, tracking and cancellation.
//!
//! # Placement
//!
//! Creating the order and clearing the cart are two separate steps. A
//! pending-checkout marker is written to local storage before the order is
//! created and removed after the cart is cleared. [`OrderService::reconcile`]
//! runs on load: a leftover marker whose order exists means the cart is stale
//! and gets cleared.
//!
//! # Realtime
//!
//! [`OrderTracker`] applies pushed status events. Delivery may repeat or skip
//! events, so an event is applied only when it moves the order forward.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use vitrine_core::{NotificationKind, OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

use crate::backend::{BackendError, CouponBackend, OrderBackend, OrderUpdates};
use crate::error::add_breadcrumb;
use crate::models::{
    NewOrder, Notification, Order, OrderItem, OrderStatusEvent, Session, ShippingAddress,
};
use crate::pricing::{OrderPricing, PricingInput};
use crate::routes::Route;
use crate::services::coupons::AppliedCoupon;
use crate::services::shipping::ShippingOption;
use crate::storage::{self, SharedStore, keys};
use crate::stores::CartStore;

/// How far a marker's timestamp may trail the order's creation time.
const MARKER_CLOCK_SLACK_SECS: i64 = 300;

/// Errors that can occur when handling orders.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("sign in to continue")]
    SignInRequired,

    #[error("your cart is empty")]
    EmptyCart,

    #[error("order not found")]
    NotFound,

    #[error("order can no longer be cancelled")]
    NotCancellable,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// What the customer chose during checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutDetails {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub shipping: Option<ShippingOption>,
    pub coupon: Option<AppliedCoupon>,
}

impl CheckoutDetails {
    /// Price breakdown for `subtotal`.
    #[must_use]
    pub fn pricing(&self, subtotal: Decimal) -> OrderPricing {
        checkout_pricing(
            subtotal,
            self.payment_method,
            self.shipping.as_ref(),
            self.coupon.as_ref(),
        )
    }
}

/// Order pricing from checkout choices; shared by the summary and submission.
#[must_use]
pub fn checkout_pricing(
    subtotal: Decimal,
    payment: PaymentMethod,
    shipping: Option<&ShippingOption>,
    coupon: Option<&AppliedCoupon>,
) -> OrderPricing {
    OrderPricing::compute(&PricingInput {
        subtotal,
        selected_shipping: shipping.map(|option| option.price),
        payment,
        coupon_discount: coupon.map_or(Decimal::ZERO, |coupon| coupon.discount),
    })
}

/// Written before an order is created, removed once the cart is cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PendingCheckout {
    user_id: UserId,
    started_at: DateTime<Utc>,
    total: Decimal,
    /// Product ids and quantities, sorted by id.
    #[serde(default)]
    lines: Vec<(ProductId, u32)>,
    #[serde(default)]
    order_id: Option<OrderId>,
}

impl PendingCheckout {
    /// Whether `order` is the one this checkout was creating.
    fn matches(&self, order: &Order) -> bool {
        let since = self.started_at - Duration::seconds(MARKER_CLOCK_SLACK_SECS);
        order.created_at >= since
            && order.total == self.total
            && sorted_lines(order.items.iter().map(|item| (item.product_id, item.quantity)))
                == self.lines
    }
}

fn sorted_lines(lines: impl Iterator<Item = (ProductId, u32)>) -> Vec<(ProductId, u32)> {
    let mut lines: Vec<_> = lines.collect();
    lines.sort_unstable();
    lines
}

/// Result of [`OrderService::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// No marker for this user.
    Clean,
    /// The order had been created; the stale cart was cleared.
    ClearedStaleCart(OrderId),
    /// The order was never created; the marker was dropped and the cart kept.
    DroppedMarker,
}

/// Places and reads orders.
#[derive(Clone)]
pub struct OrderService<B> {
    backend: B,
    store: SharedStore,
}

impl<B> std::fmt::Debug for OrderService<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService").finish_non_exhaustive()
    }
}

impl<B: OrderBackend + CouponBackend> OrderService<B> {
    pub const fn new(backend: B, store: SharedStore) -> Self {
        Self { backend, store }
    }

    /// Create an order from the cart, then clear the cart.
    ///
    /// # Errors
    ///
    /// Returns an error without a session, with an empty cart, or when the
    /// backend refuses the order. The cart is untouched on error.
    #[instrument(skip(self, session, cart, details), fields(payment = %details.payment_method))]
    pub async fn place_order(
        &self,
        session: Option<&Session>,
        cart: &mut CartStore,
        details: &CheckoutDetails,
    ) -> Result<Order, OrderError> {
        let session = session.ok_or(OrderError::SignInRequired)?;
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let pricing = details.pricing(cart.total_price());
        let new_order = NewOrder {
            user_id: session.user_id,
            items: cart
                .items()
                .iter()
                .map(|line| OrderItem {
                    product_id: line.product.id,
                    name: line.product.name.clone(),
                    image_url: line.product.image_url.clone(),
                    unit_price: line.product.price,
                    quantity: line.quantity,
                })
                .collect(),
            shipping_address: details.shipping_address.clone(),
            payment_method: details.payment_method,
            shipping_option: details.shipping.as_ref().map(|option| option.id.clone()),
            coupon_code: details.coupon.as_ref().map(|coupon| coupon.code.clone()),
            subtotal: pricing.subtotal,
            shipping_cost: pricing.shipping,
            discount: pricing.discount(),
            total: pricing.total,
        };

        let mut marker = PendingCheckout {
            user_id: session.user_id,
            started_at: Utc::now(),
            total: pricing.total,
            lines: sorted_lines(
                new_order
                    .items
                    .iter()
                    .map(|item| (item.product_id, item.quantity)),
            ),
            order_id: None,
        };
        storage::save_best_effort(self.store.as_ref(), keys::PENDING_CHECKOUT, &marker);

        let order = match self.backend.create_order(session, new_order).await {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(error = %e, "Order creation failed");
                storage::remove_best_effort(self.store.as_ref(), keys::PENDING_CHECKOUT);
                return Err(e.into());
            }
        };
        marker.order_id = Some(order.id);
        storage::save_best_effort(self.store.as_ref(), keys::PENDING_CHECKOUT, &marker);

        if let Some(coupon) = &details.coupon
            && let Err(e) = self
                .backend
                .increment_coupon_usage(session, &coupon.code)
                .await
        {
            tracing::warn!(error = %e, code = %coupon.code, "Failed to record coupon usage");
        }

        cart.clear();
        storage::remove_best_effort(self.store.as_ref(), keys::PENDING_CHECKOUT);

        add_breadcrumb("checkout", &format!("Order {} placed", order.id), None);
        tracing::info!(order_id = %order.id, total = %order.total, "Order placed");
        Ok(order)
    }

    /// Clear a cart left behind by an interrupted checkout.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried; the marker is kept
    /// for the next attempt.
    #[instrument(skip(self, session, cart), fields(user_id = %session.user_id))]
    pub async fn reconcile(
        &self,
        session: &Session,
        cart: &mut CartStore,
    ) -> Result<Reconciliation, OrderError> {
        let Some(marker) = storage::load_or_default::<Option<PendingCheckout>>(
            self.store.as_ref(),
            keys::PENDING_CHECKOUT,
        ) else {
            return Ok(Reconciliation::Clean);
        };
        if marker.user_id != session.user_id {
            return Ok(Reconciliation::Clean);
        }

        let placed = match marker.order_id {
            Some(order_id) => self
                .backend
                .get_order(session, order_id)
                .await?
                .map(|order| order.id),
            None => self
                .backend
                .list_orders_for_user(session)
                .await?
                .into_iter()
                .find(|order| marker.matches(order))
                .map(|order| order.id),
        };

        storage::remove_best_effort(self.store.as_ref(), keys::PENDING_CHECKOUT);
        if let Some(order_id) = placed {
            tracing::warn!(order_id = %order_id, "Clearing cart left by an interrupted checkout");
            cart.clear();
            Ok(Reconciliation::ClearedStaleCart(order_id))
        } else {
            tracing::info!("Dropping marker of a checkout that never created an order");
            Ok(Reconciliation::DroppedMarker)
        }
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn list_for_user(&self, session: &Session) -> Result<Vec<Order>, OrderError> {
        Ok(self.backend.list_orders_for_user(session).await?)
    }

    /// One order, visible to its owner and to admins.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotFound`] when the order does not exist or
    /// belongs to someone else.
    #[instrument(skip(self, session))]
    pub async fn track(&self, session: &Session, order_id: OrderId) -> Result<Order, OrderError> {
        match self.backend.get_order(session, order_id).await? {
            Some(order) if order.user_id == session.user_id || session.is_admin() => Ok(order),
            _ => Err(OrderError::NotFound),
        }
    }

    /// Cancel one of the user's orders while it is pending or processing.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotFound`] or [`OrderError::NotCancellable`], or
    /// the backend error.
    #[instrument(skip(self, session))]
    pub async fn cancel(&self, session: &Session, order_id: OrderId) -> Result<Order, OrderError> {
        let order = self.track(session, order_id).await?;
        if order.user_id != session.user_id {
            return Err(OrderError::NotFound);
        }
        if !order.status.is_cancellable() {
            tracing::warn!(status = %order.status, "Cancel refused");
            return Err(OrderError::NotCancellable);
        }
        let cancelled = self.backend.cancel_order(session, order_id).await?;
        tracing::info!(order_id = %order_id, "Order cancelled");
        Ok(cancelled)
    }
}

// =============================================================================
// Realtime tracking
// =============================================================================

/// Applies realtime order events on top of known order states.
#[derive(Debug)]
pub struct OrderTracker {
    updates: OrderUpdates,
    known: HashMap<OrderId, (OrderStatus, DateTime<Utc>)>,
}

impl OrderTracker {
    /// Start tracking, seeded with the orders already fetched.
    #[must_use]
    pub fn new(updates: OrderUpdates, orders: &[Order]) -> Self {
        let known = orders
            .iter()
            .map(|order| (order.id, (order.status, order.updated_at)))
            .collect();
        Self { updates, known }
    }

    /// Last known status of an order.
    #[must_use]
    pub fn status_of(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.known.get(&order_id).map(|(status, _)| *status)
    }

    /// Record an event. Returns `false` for duplicates, stale events and
    /// transitions the status machine does not allow.
    pub fn apply(&mut self, event: &OrderStatusEvent) -> bool {
        if let Some((status, updated_at)) = self.known.get(&event.order_id)
            && (event.updated_at < *updated_at || !status.can_transition_to(event.status))
        {
            tracing::debug!(order_id = %event.order_id, "Ignoring non-advancing order event");
            return false;
        }
        self.known
            .insert(event.order_id, (event.status, event.updated_at));
        tracing::info!(order_id = %event.order_id, status = %event.status, "Order status changed");
        true
    }

    /// Apply every event already delivered, returning the ones that changed state.
    pub fn drain(&mut self) -> Vec<OrderStatusEvent> {
        self.updates
            .drain()
            .into_iter()
            .filter(|event| self.apply(event))
            .collect()
    }

    /// Wait for the next event that changes state; `None` once the feed closes.
    pub async fn next(&mut self) -> Option<OrderStatusEvent> {
        loop {
            let event = self.updates.next().await?;
            if self.apply(&event) {
                return Some(event);
            }
        }
    }
}

/// Notification announcing a status change.
#[must_use]
pub fn status_notification(event: &OrderStatusEvent) -> Notification {
    let short_id: String = event.order_id.to_string().chars().take(8).collect();
    let message = match event.status {
        OrderStatus::Pending => format!("Order #{short_id} was received"),
        OrderStatus::Processing => format!("Order #{short_id} is being prepared"),
        OrderStatus::Shipped => format!("Order #{short_id} has shipped"),
        OrderStatus::Delivered => format!("Order #{short_id} was delivered"),
        OrderStatus::Cancelled => format!("Order #{short_id} was cancelled"),
    };
    Notification::new(NotificationKind::Order, "Order update", message)
        .with_link(Route::Order(event.order_id).to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use vitrine_core::{Category, Email, Phone, PostalCode, ProductId, UserRole};

    use super::*;
    use crate::backend::{AuthBackend, CatalogBackend, InMemoryBackend};
    use crate::models::{Coupon, Credentials, DiscountType, Product};
    use crate::storage::MemoryStore;

    struct Fixture {
        backend: InMemoryBackend,
        store: SharedStore,
        service: OrderService<InMemoryBackend>,
        session: Session,
        product: Product,
    }

    async fn fixture(stock: u32) -> Fixture {
        let backend = InMemoryBackend::new();
        let product = Product {
            id: ProductId::generate(),
            name: "Fone Bluetooth".to_string(),
            price: Decimal::new(100, 0),
            original_price: None,
            category: Category::Electronics,
            stock,
            image_url: "/img/fone.jpg".to_string(),
            description: None,
            rating: None,
        };
        backend.insert_product(product.clone());
        let session = backend
            .sign_up(
                &Credentials {
                    email: Email::parse("ana@example.com").unwrap(),
                    password: SecretString::from("correct-horse"),
                },
                "Ana",
            )
            .await
            .unwrap();
        let store = MemoryStore::shared();
        Fixture {
            service: OrderService::new(backend.clone(), store.clone()),
            backend,
            store,
            session,
            product,
        }
    }

    fn details(payment_method: PaymentMethod) -> CheckoutDetails {
        CheckoutDetails {
            shipping_address: ShippingAddress {
                full_name: "Ana Souza".to_string(),
                email: Email::parse("ana@example.com").unwrap(),
                phone: Phone::parse("(11) 98765-4321").unwrap(),
                postal_code: PostalCode::parse("01310-100").unwrap(),
                street: "Av. Paulista".to_string(),
                number: "1000".to_string(),
                complement: None,
                neighborhood: "Bela Vista".to_string(),
                city: "São Paulo".to_string(),
                state: "SP".to_string(),
            },
            payment_method,
            shipping: None,
            coupon: None,
        }
    }

    #[tokio::test]
    async fn test_place_order_empties_cart_and_reload_stays_empty() {
        let f = fixture(5).await;
        let mut cart = CartStore::load(f.store.clone());
        cart.add_item(&f.product);
        cart.add_item(&f.product);

        let order = f
            .service
            .place_order(Some(&f.session), &mut cart, &details(PaymentMethod::Pix))
            .await
            .unwrap();

        assert_eq!(order.item_count(), 2);
        assert_eq!(order.subtotal, Decimal::new(200, 0));
        assert_eq!(order.total, Decimal::new(190, 0));
        assert!(cart.is_empty());
        assert!(CartStore::load(f.store.clone()).is_empty());
        assert!(f.store.get(keys::PENDING_CHECKOUT).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persisted_total_matches_summary() {
        let f = fixture(5).await;
        f.backend.insert_coupon(Coupon {
            id: vitrine_core::CouponId::generate(),
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::new(10, 0),
            min_purchase: None,
            max_uses: Some(10),
            used_count: 0,
            valid_from: Utc::now() - Duration::days(1),
            valid_until: None,
            active: true,
        });
        let mut cart = CartStore::load(f.store.clone());
        cart.add_item(&f.product);
        cart.add_item(&f.product);

        let mut checkout = details(PaymentMethod::Pix);
        checkout.coupon = Some(AppliedCoupon {
            code: "SAVE10".to_string(),
            discount: Decimal::new(20, 0),
            message: String::new(),
        });
        let summary = checkout.pricing(cart.total_price());
        assert_eq!(summary.total, Decimal::new(170, 0));

        let order = f
            .service
            .place_order(Some(&f.session), &mut cart, &checkout)
            .await
            .unwrap();
        assert_eq!(order.total, summary.total);
        assert_eq!(order.discount, Decimal::new(30, 0));
        assert_eq!(
            f.backend.snapshot().coupons[0].used_count,
            1,
            "coupon usage recorded"
        );
    }

    #[tokio::test]
    async fn test_failed_creation_keeps_cart() {
        let f = fixture(1).await;
        let mut cart = CartStore::load(f.store.clone());
        cart.add_item(&f.product);
        cart.update_quantity(f.product.id, 3);

        let result = f
            .service
            .place_order(Some(&f.session), &mut cart, &details(PaymentMethod::Boleto))
            .await;
        assert!(matches!(result, Err(OrderError::Backend(BackendError::Conflict(_)))));
        assert_eq!(cart.item_quantity(f.product.id), 3);
        assert!(f.store.get(keys::PENDING_CHECKOUT).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_place_order_guards() {
        let f = fixture(1).await;
        let mut cart = CartStore::load(f.store.clone());
        assert!(matches!(
            f.service
                .place_order(Some(&f.session), &mut cart, &details(PaymentMethod::Pix))
                .await,
            Err(OrderError::EmptyCart)
        ));
        cart.add_item(&f.product);
        assert!(matches!(
            f.service
                .place_order(None, &mut cart, &details(PaymentMethod::Pix))
                .await,
            Err(OrderError::SignInRequired)
        ));
    }

    #[tokio::test]
    async fn test_reconcile_clears_stale_cart() {
        let f = fixture(5).await;
        let mut cart = CartStore::load(f.store.clone());
        cart.add_item(&f.product);

        // Simulate a crash after the order was created but before the cart was cleared.
        let new_order = NewOrder {
            user_id: f.session.user_id,
            items: vec![OrderItem {
                product_id: f.product.id,
                name: f.product.name.clone(),
                image_url: f.product.image_url.clone(),
                unit_price: f.product.price,
                quantity: 1,
            }],
            shipping_address: details(PaymentMethod::Pix).shipping_address,
            payment_method: PaymentMethod::Pix,
            shipping_option: None,
            coupon_code: None,
            subtotal: Decimal::new(100, 0),
            shipping_cost: Decimal::ZERO,
            discount: Decimal::new(5, 0),
            total: Decimal::new(95, 0),
        };
        storage::save_best_effort(
            f.store.as_ref(),
            keys::PENDING_CHECKOUT,
            &PendingCheckout {
                user_id: f.session.user_id,
                started_at: Utc::now(),
                total: Decimal::new(95, 0),
                lines: vec![(f.product.id, 1)],
                order_id: None,
            },
        );
        let order = f.backend.create_order(&f.session, new_order).await.unwrap();

        let outcome = f.service.reconcile(&f.session, &mut cart).await.unwrap();
        assert_eq!(outcome, Reconciliation::ClearedStaleCart(order.id));
        assert!(cart.is_empty());
        assert_eq!(
            f.service.reconcile(&f.session, &mut cart).await.unwrap(),
            Reconciliation::Clean
        );
    }

    #[tokio::test]
    async fn test_reconcile_drops_marker_without_order() {
        let f = fixture(5).await;
        let mut cart = CartStore::load(f.store.clone());
        cart.add_item(&f.product);
        storage::save_best_effort(
            f.store.as_ref(),
            keys::PENDING_CHECKOUT,
            &PendingCheckout {
                user_id: f.session.user_id,
                started_at: Utc::now(),
                total: Decimal::new(95, 0),
                lines: vec![(f.product.id, 1)],
                order_id: None,
            },
        );

        let outcome = f.service.reconcile(&f.session, &mut cart).await.unwrap();
        assert_eq!(outcome, Reconciliation::DroppedMarker);
        assert_eq!(cart.item_quantity(f.product.id), 1);
    }

    #[tokio::test]
    async fn test_reconcile_ignores_other_order_with_same_total() {
        let f = fixture(5).await;
        let mut cart = CartStore::load(f.store.clone());
        cart.add_item(&f.product);
        cart.add_item(&f.product);

        // Another device ordered one unit for the same total.
        let other_device = NewOrder {
            user_id: f.session.user_id,
            items: vec![OrderItem {
                product_id: f.product.id,
                name: f.product.name.clone(),
                image_url: f.product.image_url.clone(),
                unit_price: f.product.price,
                quantity: 1,
            }],
            shipping_address: details(PaymentMethod::Pix).shipping_address,
            payment_method: PaymentMethod::Pix,
            shipping_option: None,
            coupon_code: None,
            subtotal: Decimal::new(190, 0),
            shipping_cost: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::new(190, 0),
        };
        f.backend
            .create_order(&f.session, other_device)
            .await
            .unwrap();
        storage::save_best_effort(
            f.store.as_ref(),
            keys::PENDING_CHECKOUT,
            &PendingCheckout {
                user_id: f.session.user_id,
                started_at: Utc::now(),
                total: Decimal::new(190, 0),
                lines: vec![(f.product.id, 2)],
                order_id: None,
            },
        );

        let outcome = f.service.reconcile(&f.session, &mut cart).await.unwrap();
        assert_eq!(outcome, Reconciliation::DroppedMarker);
        assert_eq!(cart.item_quantity(f.product.id), 2);
    }

    #[tokio::test]
    async fn test_track_and_cancel() {
        let f = fixture(5).await;
        let mut cart = CartStore::load(f.store.clone());
        cart.add_item(&f.product);
        let order = f
            .service
            .place_order(Some(&f.session), &mut cart, &details(PaymentMethod::CreditCard))
            .await
            .unwrap();

        let other = f
            .backend
            .sign_up(
                &Credentials {
                    email: Email::parse("bia@example.com").unwrap(),
                    password: SecretString::from("correct-horse"),
                },
                "Bia",
            )
            .await
            .unwrap();
        assert!(matches!(
            f.service.track(&other, order.id).await,
            Err(OrderError::NotFound)
        ));

        let cancelled = f.service.cancel(&f.session, order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(matches!(
            f.service.cancel(&f.session, order.id).await,
            Err(OrderError::NotCancellable)
        ));
        assert_eq!(f.backend.get_product(f.product.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_tracker_applies_events_idempotently() {
        let f = fixture(5).await;
        let admin_email = Email::parse("admin@example.com").unwrap();
        f.backend
            .register_user(&admin_email, "correct-horse", "Admin", UserRole::Admin)
            .unwrap();
        let admin = f
            .backend
            .sign_in(&Credentials {
                email: admin_email,
                password: SecretString::from("correct-horse"),
            })
            .await
            .unwrap();

        let mut cart = CartStore::load(f.store.clone());
        cart.add_item(&f.product);
        let order = f
            .service
            .place_order(Some(&f.session), &mut cart, &details(PaymentMethod::Pix))
            .await
            .unwrap();

        let updates = f.backend.subscribe_order_updates(&f.session).await.unwrap();
        let mut tracker = OrderTracker::new(updates, std::slice::from_ref(&order));

        f.backend
            .update_order_status(&admin, order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        let applied = tracker.drain();
        assert_eq!(applied.len(), 1);
        assert_eq!(tracker.status_of(order.id), Some(OrderStatus::Shipped));

        // Redelivery and out-of-order events change nothing.
        assert!(!tracker.apply(&applied[0]));
        let stale = OrderStatusEvent {
            status: OrderStatus::Processing,
            ..applied[0]
        };
        assert!(!tracker.apply(&stale));
        assert_eq!(tracker.status_of(order.id), Some(OrderStatus::Shipped));

        let note = status_notification(&applied[0]);
        assert_eq!(note.kind, NotificationKind::Order);
        assert_eq!(note.link, Some(format!("/order/{}", order.id)));
    }
}
