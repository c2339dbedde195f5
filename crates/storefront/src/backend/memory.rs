//! Process-local backend.
//!
//! Tables live behind one `RwLock`; realtime order updates go through a
//! `broadcast` channel. The whole state can be snapshotted to a serde value and
//! restored, which is how the CLI keeps its demo shop between invocations.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::instrument;

use vitrine_core::{Email, OrderId, OrderStatus, ProductId, UserId, UserRole};

use super::{
    AuthBackend, BackendError, CatalogBackend, CouponBackend, FavoriteBackend, FileStorage,
    OrderBackend, OrderUpdates,
};
use crate::models::{
    Coupon, Credentials, ImageUpload, NewOrder, Order, OrderStatusEvent, Product, Session,
};

/// Minimum password length accepted on sign-up.
pub const MIN_PASSWORD_LENGTH: usize = 6;

const REALTIME_CAPACITY: usize = 64;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: Email,
    pub display_name: String,
    #[serde(default)]
    pub role: UserRole,
    /// Argon2id PHC string.
    pub password_hash: String,
}

/// Serializable copy of every table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSnapshot {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub coupons: Vec<Coupon>,
    #[serde(default)]
    pub orders: Vec<Order>,
    /// `(user, product)` pairs.
    #[serde(default)]
    pub favorites: Vec<(UserId, ProductId)>,
    /// Live access tokens.
    #[serde(default)]
    pub sessions: HashMap<String, UserId>,
}

/// In-memory [`Backend`](super::Backend) implementation.
#[derive(Clone)]
pub struct InMemoryBackend {
    inner: Arc<InMemoryBackendInner>,
}

struct InMemoryBackendInner {
    tables: RwLock<BackendSnapshot>,
    files: RwLock<HashMap<String, Vec<u8>>>,
    updates: broadcast::Sender<OrderStatusEvent>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.read();
        f.debug_struct("InMemoryBackend")
            .field("users", &tables.users.len())
            .field("products", &tables.products.len())
            .field("orders", &tables.orders.len())
            .finish_non_exhaustive()
    }
}

impl InMemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::from_snapshot(BackendSnapshot::default())
    }

    /// Restore a backend from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: BackendSnapshot) -> Self {
        let (updates, _) = broadcast::channel(REALTIME_CAPACITY);
        Self {
            inner: Arc::new(InMemoryBackendInner {
                tables: RwLock::new(snapshot),
                files: RwLock::new(HashMap::new()),
                updates,
            }),
        }
    }

    /// Copy every table. Uploaded files are not included.
    #[must_use]
    pub fn snapshot(&self) -> BackendSnapshot {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, BackendSnapshot> {
        self.inner
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BackendSnapshot> {
        self.inner
            .tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Create an account with the given role.
    ///
    /// # Errors
    ///
    /// Returns an error if the email is taken or the password is too short.
    pub fn register_user(
        &self,
        email: &Email,
        password: &str,
        display_name: &str,
        role: UserRole,
    ) -> Result<UserId, BackendError> {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(BackendError::Rejected(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let password_hash = hash_password(password)?;

        let mut tables = self.write();
        if tables.users.iter().any(|user| &user.email == email) {
            return Err(BackendError::Conflict("user already exists".to_string()));
        }
        let id = UserId::generate();
        tables.users.push(UserRecord {
            id,
            email: email.clone(),
            display_name: display_name.to_string(),
            role,
            password_hash,
        });
        Ok(id)
    }

    /// Insert or replace a product by id.
    pub fn insert_product(&self, product: Product) {
        let mut tables = self.write();
        match tables.products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => tables.products.push(product),
        }
    }

    /// Insert or replace a coupon by code.
    pub fn insert_coupon(&self, mut coupon: Coupon) {
        coupon.code = coupon.code.trim().to_uppercase();
        let mut tables = self.write();
        match tables.coupons.iter_mut().find(|c| c.code == coupon.code) {
            Some(existing) => *existing = coupon,
            None => tables.coupons.push(coupon),
        }
    }

    // =========================================================================
    // Access checks
    // =========================================================================

    /// Resolve the session's token to its account role.
    fn authorize(&self, session: &Session) -> Result<UserRole, BackendError> {
        let tables = self.read();
        if tables.sessions.get(&session.access_token) != Some(&session.user_id) {
            return Err(BackendError::Unauthorized("session expired".to_string()));
        }
        tables
            .users
            .iter()
            .find(|user| user.id == session.user_id)
            .map(|user| user.role)
            .ok_or_else(|| BackendError::Unauthorized("unknown user".to_string()))
    }

    fn require_admin(&self, session: &Session) -> Result<(), BackendError> {
        match self.authorize(session)? {
            UserRole::Admin => Ok(()),
            UserRole::Customer => Err(BackendError::Unauthorized(
                "admin role required".to_string(),
            )),
        }
    }

    fn open_session(&self, user: &UserRecord) -> Session {
        let access_token = uuid::Uuid::new_v4().simple().to_string();
        self.write()
            .sessions
            .insert(access_token.clone(), user.id);
        Session {
            user_id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            access_token,
        }
    }

    fn publish(&self, order: &Order) {
        // No receivers is fine: nobody is subscribed yet.
        let _ = self.inner.updates.send(OrderStatusEvent::from(order));
    }
}

fn hash_password(password: &str) -> Result<String, BackendError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| BackendError::Rejected("password could not be hashed".to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<(), BackendError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| BackendError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| BackendError::InvalidCredentials)
}

/// Put an order's units back on the shelf.
fn restock(products: &mut [Product], order: &Order) {
    for item in &order.items {
        if let Some(product) = products.iter_mut().find(|p| p.id == item.product_id) {
            product.stock = product.stock.saturating_add(item.quantity);
        }
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

// =============================================================================
// Trait implementations
// =============================================================================

impl AuthBackend for InMemoryBackend {
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, BackendError> {
        let user = self
            .read()
            .users
            .iter()
            .find(|user| user.email == credentials.email)
            .cloned()
            .ok_or(BackendError::InvalidCredentials)?;

        verify_password(credentials.password.expose_secret(), &user.password_hash)?;
        Ok(self.open_session(&user))
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_up(
        &self,
        credentials: &Credentials,
        display_name: &str,
    ) -> Result<Session, BackendError> {
        let id = self.register_user(
            &credentials.email,
            credentials.password.expose_secret(),
            display_name,
            UserRole::Customer,
        )?;
        let user = self
            .read()
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound("user".to_string()))?;
        Ok(self.open_session(&user))
    }

    async fn sign_out(&self, session: &Session) -> Result<(), BackendError> {
        self.write().sessions.remove(&session.access_token);
        Ok(())
    }
}

impl CatalogBackend for InMemoryBackend {
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        Ok(self.read().products.iter().rev().cloned().collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        Ok(self.read().products.iter().find(|p| p.id == id).cloned())
    }

    #[instrument(skip(self, session), fields(product_id = %id))]
    async fn set_stock(
        &self,
        session: &Session,
        id: ProductId,
        stock: u32,
    ) -> Result<Product, BackendError> {
        self.require_admin(session)?;
        let mut tables = self.write();
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("product {id}")))?;
        product.stock = stock;
        Ok(product.clone())
    }
}

impl CouponBackend for InMemoryBackend {
    async fn find_active_coupon(&self, code: &str) -> Result<Option<Coupon>, BackendError> {
        Ok(self
            .read()
            .coupons
            .iter()
            .find(|c| c.active && c.code == code)
            .cloned())
    }

    #[instrument(skip(self, session))]
    async fn increment_coupon_usage(
        &self,
        session: &Session,
        code: &str,
    ) -> Result<(), BackendError> {
        self.authorize(session)?;
        let mut tables = self.write();
        let coupon = tables
            .coupons
            .iter_mut()
            .find(|c| c.code == code)
            .ok_or_else(|| BackendError::NotFound(format!("coupon {code}")))?;
        coupon.used_count = coupon.used_count.saturating_add(1);
        Ok(())
    }

    #[instrument(skip(self, session, coupon), fields(code = %coupon.code))]
    async fn upsert_coupon(
        &self,
        session: &Session,
        coupon: Coupon,
    ) -> Result<Coupon, BackendError> {
        self.require_admin(session)?;
        self.insert_coupon(coupon.clone());
        let code = coupon.code.trim().to_uppercase();
        self.read()
            .coupons
            .iter()
            .find(|c| c.code == code)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("coupon {code}")))
    }
}

impl OrderBackend for InMemoryBackend {
    #[instrument(skip(self, session, order), fields(user_id = %session.user_id))]
    async fn create_order(
        &self,
        session: &Session,
        order: NewOrder,
    ) -> Result<Order, BackendError> {
        self.authorize(session)?;
        if order.user_id != session.user_id {
            return Err(BackendError::Unauthorized(
                "order belongs to another user".to_string(),
            ));
        }
        if order.items.is_empty() {
            return Err(BackendError::Rejected("order has no items".to_string()));
        }

        let mut tables = self.write();
        for item in &order.items {
            let available = tables
                .products
                .iter()
                .find(|p| p.id == item.product_id)
                .map(|p| p.stock)
                .ok_or_else(|| BackendError::Conflict(format!("product {} is gone", item.name)))?;
            if available < item.quantity {
                return Err(BackendError::Conflict(format!(
                    "insufficient stock for {}",
                    item.name
                )));
            }
        }
        for item in &order.items {
            if let Some(product) = tables.products.iter_mut().find(|p| p.id == item.product_id) {
                product.stock -= item.quantity;
            }
        }

        let created = Order::from_new(OrderId::generate(), order, Utc::now());
        tables.orders.push(created.clone());
        Ok(created)
    }

    async fn get_order(
        &self,
        session: &Session,
        id: OrderId,
    ) -> Result<Option<Order>, BackendError> {
        let role = self.authorize(session)?;
        Ok(self
            .read()
            .orders
            .iter()
            .find(|o| o.id == id && (o.user_id == session.user_id || role == UserRole::Admin))
            .cloned())
    }

    async fn list_orders_for_user(&self, session: &Session) -> Result<Vec<Order>, BackendError> {
        self.authorize(session)?;
        let orders = self
            .read()
            .orders
            .iter()
            .filter(|o| o.user_id == session.user_id)
            .cloned()
            .collect();
        Ok(newest_first(orders))
    }

    async fn list_all_orders(&self, session: &Session) -> Result<Vec<Order>, BackendError> {
        self.require_admin(session)?;
        Ok(newest_first(self.read().orders.clone()))
    }

    #[instrument(skip(self, session), fields(order_id = %id, status = %status))]
    async fn update_order_status(
        &self,
        session: &Session,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, BackendError> {
        self.require_admin(session)?;
        let updated = {
            let mut guard = self.write();
            let tables = &mut *guard;
            let order = tables
                .orders
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or_else(|| BackendError::NotFound(format!("order {id}")))?;
            if !order.status.can_transition_to(status) {
                return Err(BackendError::Conflict(format!(
                    "cannot move order from {} to {status}",
                    order.status
                )));
            }
            order.status = status;
            order.updated_at = Utc::now();
            let updated = order.clone();
            if status == OrderStatus::Cancelled {
                restock(&mut tables.products, &updated);
            }
            updated
        };
        self.publish(&updated);
        Ok(updated)
    }

    #[instrument(skip(self, session), fields(order_id = %id))]
    async fn cancel_order(&self, session: &Session, id: OrderId) -> Result<Order, BackendError> {
        self.authorize(session)?;
        let updated = {
            let mut guard = self.write();
            let tables = &mut *guard;
            let order = tables
                .orders
                .iter_mut()
                .find(|o| o.id == id && o.user_id == session.user_id)
                .ok_or_else(|| BackendError::NotFound(format!("order {id}")))?;
            if !order.status.is_cancellable() {
                return Err(BackendError::Conflict(format!(
                    "order is already {}",
                    order.status
                )));
            }
            order.status = OrderStatus::Cancelled;
            order.updated_at = Utc::now();
            let updated = order.clone();
            restock(&mut tables.products, &updated);
            updated
        };
        self.publish(&updated);
        Ok(updated)
    }

    async fn subscribe_order_updates(
        &self,
        session: &Session,
    ) -> Result<OrderUpdates, BackendError> {
        self.authorize(session)?;
        Ok(OrderUpdates::new(
            session.user_id,
            self.inner.updates.subscribe(),
        ))
    }
}

impl FavoriteBackend for InMemoryBackend {
    async fn list_favorites(&self, user_id: UserId) -> Result<Vec<ProductId>, BackendError> {
        Ok(self
            .read()
            .favorites
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, product_id)| *product_id)
            .collect())
    }

    async fn add_favorite(
        &self,
        session: &Session,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        self.authorize(session)?;
        let row = (session.user_id, product_id);
        let mut tables = self.write();
        if !tables.favorites.contains(&row) {
            tables.favorites.push(row);
        }
        Ok(())
    }

    async fn remove_favorite(
        &self,
        session: &Session,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        self.authorize(session)?;
        self.write()
            .favorites
            .retain(|row| *row != (session.user_id, product_id));
        Ok(())
    }
}

impl FileStorage for InMemoryBackend {
    #[instrument(skip(self, session, file), fields(size = file.bytes.len()))]
    async fn upload(
        &self,
        session: &Session,
        bucket: &str,
        path: &str,
        file: &ImageUpload,
    ) -> Result<String, BackendError> {
        self.authorize(session)?;
        let key = format!("{bucket}/{path}");
        self.inner
            .files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), file.bytes.clone());
        Ok(format!("memory://{key}"))
    }
}
