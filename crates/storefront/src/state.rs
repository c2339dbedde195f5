//! The storefront root: session plus every store and service.
//!
//! Construction order follows the dependencies between parts: the session
//! comes first, favorites, orders and notifications depend on it, the cart is
//! reconciled against orders, and checkout depends on the cart. Signing in or
//! out reloads the per-user parts in that order.

use std::sync::Arc;

use tracing::instrument;

use vitrine_core::ProductId;

use crate::backend::Backend;
use crate::checkout::CheckoutFlow;
use crate::config::StorefrontConfig;
use crate::error::{AppError, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::models::{Credentials, Order, OrderStatusEvent, Review, ReviewDraft, Session};
use crate::services::coupons::CouponOutcome;
use crate::services::orders::status_notification;
use crate::services::{
    AdminService, CatalogService, ChatClient, CouponValidator, OrderService, OrderTracker,
    Reconciliation, ShippingCalculator,
};
use crate::storage::{self, SharedStore, keys};
use crate::stores::{
    BrowsingHistory, CartStore, CompareList, FavoritesStore, NativeNotifier, NotificationCenter,
    RecentSearches, ReviewStore,
};

/// Everything a storefront session needs.
pub struct Storefront<B> {
    backend: B,
    store: SharedStore,
    notifier: Option<Arc<dyn NativeNotifier>>,

    session: Option<Session>,

    catalog: CatalogService<B>,
    coupons: CouponValidator<B>,
    orders: OrderService<B>,
    admin: AdminService<B>,
    shipping: ShippingCalculator,
    chat: Option<ChatClient>,

    favorites: FavoritesStore,
    notifications: Option<NotificationCenter>,
    tracker: Option<OrderTracker>,
    cart: CartStore,
    compare: CompareList,
    reviews: ReviewStore,
    recent_searches: RecentSearches,
    browsing_history: BrowsingHistory,
    checkout: CheckoutFlow,
}

impl<B> std::fmt::Debug for Storefront<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("session", &self.session)
            .field("cart", &self.cart)
            .field("checkout", &self.checkout)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Storefront<B> {
    /// Build the storefront over `backend` and `store`. Call
    /// [`Self::restore`] afterwards to resume a persisted session.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat client cannot be built.
    pub fn new(
        backend: B,
        store: SharedStore,
        config: &StorefrontConfig,
    ) -> Result<Self, AppError> {
        let chat = config.chat_url.clone().map(ChatClient::new).transpose()?;

        Ok(Self {
            catalog: CatalogService::new(backend.clone()),
            coupons: CouponValidator::new(backend.clone()),
            orders: OrderService::new(backend.clone(), store.clone()),
            admin: AdminService::new(backend.clone()),
            shipping: ShippingCalculator::new(config.shipping_delay),
            chat,
            favorites: FavoritesStore::new(store.clone()),
            notifications: None,
            tracker: None,
            cart: CartStore::load(store.clone()),
            compare: CompareList::load(store.clone()),
            reviews: ReviewStore::load(store.clone()),
            recent_searches: RecentSearches::load(store.clone()),
            browsing_history: BrowsingHistory::load(store.clone()),
            checkout: CheckoutFlow::new(config.payment_delay),
            session: None,
            notifier: None,
            backend,
            store,
        })
    }

    /// Mirror notifications to the OS through `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NativeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Resume the persisted session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the per-user parts cannot be loaded; the session is
    /// dropped in that case.
    pub async fn restore(&mut self) -> Result<Option<&Session>, AppError> {
        let stored: Option<Session> = storage::load_or_default(self.store.as_ref(), keys::SESSION);
        let Some(session) = stored else {
            return Ok(None);
        };
        if let Err(e) = self.activate(session).await {
            tracing::warn!(error = %e, "Dropping stored session");
            return Err(e);
        }
        Ok(self.session.as_ref())
    }

    /// Sign in and load the user's favorites, notifications and orders.
    ///
    /// # Errors
    ///
    /// Returns an error for rejected credentials or backend failures.
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn sign_in(&mut self, credentials: &Credentials) -> Result<&Session, AppError> {
        let session = self.backend.sign_in(credentials).await?;
        self.activate(session).await?;
        self.current_session()
    }

    /// Create an account and sign in with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the account cannot be created.
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn sign_up(
        &mut self,
        credentials: &Credentials,
        display_name: &str,
    ) -> Result<&Session, AppError> {
        let session = self.backend.sign_up(credentials, display_name).await?;
        self.activate(session).await?;
        self.current_session()
    }

    fn current_session(&self) -> Result<&Session, AppError> {
        self.session
            .as_ref()
            .ok_or_else(|| AppError::Internal("session missing after activation".to_string()))
    }

    /// Load the per-user parts, then persist the session. Nothing is
    /// persisted unless every step succeeds.
    async fn activate(&mut self, session: Session) -> Result<(), AppError> {
        if let Err(e) = self.load_user_state(&session).await {
            self.deactivate();
            if let Err(revoke) = self.backend.sign_out(&session).await {
                tracing::warn!(error = %revoke, "Could not revoke session after failed sign-in");
            }
            return Err(e);
        }

        storage::save_best_effort(self.store.as_ref(), keys::SESSION, &session);
        set_sentry_user(&session.user_id, Some(session.email.as_str()));
        add_breadcrumb("auth", "Signed in", None);
        tracing::info!(user_id = %session.user_id, "Signed in");
        self.session = Some(session);
        Ok(())
    }

    async fn load_user_state(&mut self, session: &Session) -> Result<(), AppError> {
        self.favorites.load(&self.backend, session).await?;

        let mut notifications = NotificationCenter::load(self.store.clone(), session.user_id);
        if let Some(notifier) = &self.notifier {
            notifications = notifications.with_notifier(Arc::clone(notifier));
        }
        self.notifications = Some(notifications);

        match self.orders.reconcile(session, &mut self.cart).await? {
            Reconciliation::ClearedStaleCart(order_id) => {
                tracing::info!(order_id = %order_id, "Recovered interrupted checkout");
            }
            Reconciliation::Clean | Reconciliation::DroppedMarker => {}
        }

        let orders = self.orders.list_for_user(session).await?;
        let updates = self.backend.subscribe_order_updates(session).await?;
        self.tracker = Some(OrderTracker::new(updates, &orders));
        Ok(())
    }

    /// Sign out; per-user parts are unloaded even if the backend call fails.
    pub async fn sign_out(&mut self) {
        if let Some(session) = &self.session
            && let Err(e) = self.backend.sign_out(session).await
        {
            tracing::warn!(error = %e, "Backend sign-out failed");
        }
        self.deactivate();
        add_breadcrumb("auth", "Signed out", None);
        tracing::info!("Signed out");
    }

    fn deactivate(&mut self) {
        storage::remove_best_effort(self.store.as_ref(), keys::SESSION);
        clear_sentry_user();
        self.session = None;
        self.favorites.unload();
        self.notifications = None;
        self.tracker = None;
        self.checkout.reset();
    }

    // =========================================================================
    // Actions spanning several parts
    // =========================================================================

    /// Apply pending realtime order events and raise a notification for each.
    pub fn apply_order_updates(&mut self) -> Vec<OrderStatusEvent> {
        let Some(tracker) = &mut self.tracker else {
            return Vec::new();
        };
        let applied = tracker.drain();
        if let Some(notifications) = &mut self.notifications {
            for event in &applied {
                notifications.push(status_notification(event));
            }
        }
        applied
    }

    /// Wait for the next realtime order event and raise its notification.
    /// Returns `None` when signed out or once the feed closes.
    pub async fn next_order_update(&mut self) -> Option<OrderStatusEvent> {
        let event = self.tracker.as_mut()?.next().await?;
        if let Some(notifications) = &mut self.notifications {
            notifications.push(status_notification(&event));
        }
        Some(event)
    }

    /// Validate a coupon against the cart and apply it to the checkout.
    pub async fn apply_coupon(&mut self, code: &str) -> CouponOutcome {
        let subtotal = self.cart.total_price();
        self.checkout
            .apply_coupon(&self.coupons, code, subtotal)
            .await
    }

    /// Re-read stock for the products in the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched.
    pub async fn refresh_cart_stock(&mut self) -> Result<(), AppError> {
        let products = self.backend.list_products().await?;
        self.cart.refresh_stock(&products);
        Ok(())
    }

    /// Submit the checkout with the current cart.
    ///
    /// # Errors
    ///
    /// Returns the checkout error; the flow stays on the payment step.
    pub async fn submit_checkout(&mut self) -> Result<Order, AppError> {
        let order = self
            .checkout
            .submit(&self.orders, self.session.as_ref(), &mut self.cart)
            .await?;
        Ok(order)
    }

    /// Add or remove a favorite.
    ///
    /// # Errors
    ///
    /// Returns an error without a session or when the backend fails.
    pub async fn toggle_favorite(&mut self, product_id: ProductId) -> Result<bool, AppError> {
        Ok(self
            .favorites
            .toggle(&self.backend, self.session.as_ref(), product_id)
            .await?)
    }

    /// Write a review.
    ///
    /// # Errors
    ///
    /// Returns a validation, duplicate or upload error.
    pub async fn submit_review(&mut self, draft: ReviewDraft) -> Result<Review, AppError> {
        Ok(self
            .reviews
            .submit(&self.backend, self.session.as_ref(), draft)
            .await?)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub const fn catalog(&self) -> &CatalogService<B> {
        &self.catalog
    }

    #[must_use]
    pub const fn coupons(&self) -> &CouponValidator<B> {
        &self.coupons
    }

    #[must_use]
    pub const fn orders(&self) -> &OrderService<B> {
        &self.orders
    }

    #[must_use]
    pub const fn admin(&self) -> &AdminService<B> {
        &self.admin
    }

    #[must_use]
    pub const fn shipping(&self) -> &ShippingCalculator {
        &self.shipping
    }

    #[must_use]
    pub const fn chat(&self) -> Option<&ChatClient> {
        self.chat.as_ref()
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub const fn cart_mut(&mut self) -> &mut CartStore {
        &mut self.cart
    }

    #[must_use]
    pub const fn compare(&self) -> &CompareList {
        &self.compare
    }

    pub const fn compare_mut(&mut self) -> &mut CompareList {
        &mut self.compare
    }

    #[must_use]
    pub const fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    #[must_use]
    pub const fn notifications(&self) -> Option<&NotificationCenter> {
        self.notifications.as_ref()
    }

    pub const fn notifications_mut(&mut self) -> Option<&mut NotificationCenter> {
        self.notifications.as_mut()
    }

    #[must_use]
    pub const fn reviews(&self) -> &ReviewStore {
        &self.reviews
    }

    pub const fn reviews_mut(&mut self) -> &mut ReviewStore {
        &mut self.reviews
    }

    pub const fn recent_searches_mut(&mut self) -> &mut RecentSearches {
        &mut self.recent_searches
    }

    #[must_use]
    pub const fn recent_searches(&self) -> &RecentSearches {
        &self.recent_searches
    }

    pub const fn browsing_history_mut(&mut self) -> &mut BrowsingHistory {
        &mut self.browsing_history
    }

    #[must_use]
    pub const fn browsing_history(&self) -> &BrowsingHistory {
        &self.browsing_history
    }

    #[must_use]
    pub const fn checkout(&self) -> &CheckoutFlow {
        &self.checkout
    }

    pub const fn checkout_mut(&mut self) -> &mut CheckoutFlow {
        &mut self.checkout
    }
}
