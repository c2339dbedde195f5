//! Hosted backend over HTTP.
//!
//! Talks to a PostgREST-style API (`/rest/v1/<table>`), the auth service
//! (`/auth/v1/*`) and object storage (`/storage/v1/object`). Product reads are
//! cached with `moka`; realtime order updates are produced by a polling task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, instrument};
use url::Url;

use vitrine_core::{Email, OrderId, OrderStatus, ProductId, UserId, UserRole};

use super::{
    AuthBackend, BackendError, CatalogBackend, CouponBackend, FavoriteBackend, FileStorage,
    OrderBackend, OrderUpdates,
};
use crate::config::BackendConfig;
use crate::models::{
    Coupon, Credentials, ImageUpload, NewOrder, Order, OrderStatusEvent, Product, Session,
};

const REALTIME_CAPACITY: usize = 64;

/// Cache key for product reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Products,
    Product(ProductId),
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Products(Vec<Product>),
    Product(Box<Product>),
}

/// Auth service response for password grants and sign-ups.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: UserId,
    email: Email,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FavoriteRow {
    product_id: ProductId,
}

// =============================================================================
// RestBackend
// =============================================================================

/// HTTP [`Backend`](super::Backend) implementation.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    cache: Cache<CacheKey, CacheValue>,
    poll_interval: Duration,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl RestBackend {
    /// Create a client for the configured project.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.product_cache_ttl)
            .build();

        Self {
            inner: Arc::new(RestBackendInner {
                client: reqwest::Client::new(),
                base_url: config.url.clone(),
                anon_key: config.anon_key.clone(),
                cache,
                poll_interval: config.realtime_poll,
            }),
        }
    }

    /// Build a request with the project key and a bearer token.
    ///
    /// Without a session the anon key doubles as the bearer token.
    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        session: Option<&Session>,
    ) -> Result<RequestBuilder, BackendError> {
        let mut url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| BackendError::Parse(format!("invalid backend path {path}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let anon_key = self.inner.anon_key.expose_secret();
        let bearer = session.map_or(anon_key, |s| s.access_token.as_str());
        Ok(self
            .inner
            .client
            .request(method, url)
            .header("apikey", anon_key)
            .bearer_auth(bearer))
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let message = body.chars().take(200).collect::<String>();
        tracing::error!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "Backend returned non-success status"
        );
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
            StatusCode::NOT_FOUND => BackendError::NotFound(message),
            StatusCode::CONFLICT => BackendError::Conflict(message),
            _ => BackendError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e.to_string())
        })
    }

    /// Fetch the rows of a PostgREST representation response and take the first.
    async fn fetch_one<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, BackendError> {
        let rows: Vec<T> = self.fetch(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(what.to_string()))
    }

    async fn session_from(&self, auth: AuthResponse) -> Result<Session, BackendError> {
        let mut session = Session {
            user_id: auth.user.id,
            display_name: auth
                .user
                .user_metadata
                .full_name
                .unwrap_or_else(|| auth.user.email.as_str().to_string()),
            email: auth.user.email,
            role: UserRole::Customer,
            access_token: auth.access_token,
        };

        let request = self.request(
            Method::GET,
            "/rest/v1/profiles",
            &[
                ("id", format!("eq.{}", session.user_id)),
                ("select", "role".to_string()),
            ],
            Some(&session),
        )?;
        let profiles: Vec<ProfileRow> = self.fetch(request).await?;
        session.role = profiles
            .into_iter()
            .find_map(|p| p.role)
            .and_then(|role| role.parse().ok())
            .unwrap_or_default();
        Ok(session)
    }

    /// Poll the session user's orders and broadcast status changes.
    ///
    /// Stops once every subscriber has been dropped.
    async fn poll_orders(self, session: Session, sender: broadcast::Sender<OrderStatusEvent>) {
        let mut known: HashMap<OrderId, OrderStatus> = HashMap::new();
        let mut primed = false;
        let mut ticker = tokio::time::interval(self.inner.poll_interval);

        loop {
            ticker.tick().await;
            if sender.receiver_count() == 0 {
                debug!(user_id = %session.user_id, "Order feed has no subscribers, stopping");
                return;
            }

            match self.list_orders_for_user(&session).await {
                Ok(orders) => {
                    for order in &orders {
                        let previous = known.insert(order.id, order.status);
                        if primed && previous != Some(order.status) {
                            let _ = sender.send(OrderStatusEvent::from(order));
                        }
                    }
                    primed = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Order feed poll failed");
                }
            }
        }
    }
}

// =============================================================================
// Trait implementations
// =============================================================================

impl AuthBackend for RestBackend {
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, BackendError> {
        let request = self
            .request(
                Method::POST,
                "/auth/v1/token",
                &[("grant_type", "password".to_string())],
                None,
            )?
            .json(&json!({
                "email": credentials.email.as_str(),
                "password": credentials.password.expose_secret(),
            }));

        let auth: AuthResponse = match self.fetch(request).await {
            Ok(auth) => auth,
            Err(BackendError::Api { status: 400, .. }) => {
                return Err(BackendError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };
        self.session_from(auth).await
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_up(
        &self,
        credentials: &Credentials,
        display_name: &str,
    ) -> Result<Session, BackendError> {
        let request = self
            .request(Method::POST, "/auth/v1/signup", &[], None)?
            .json(&json!({
                "email": credentials.email.as_str(),
                "password": credentials.password.expose_secret(),
                "data": { "full_name": display_name },
            }));
        let auth: AuthResponse = self.fetch(request).await?;
        self.session_from(auth).await
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn sign_out(&self, session: &Session) -> Result<(), BackendError> {
        let request = self.request(Method::POST, "/auth/v1/logout", &[], Some(session))?;
        self.execute(request).await?;
        Ok(())
    }
}

impl CatalogBackend for RestBackend {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        if let Some(CacheValue::Products(products)) =
            self.inner.cache.get(&CacheKey::Products).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let request = self.request(
            Method::GET,
            "/rest/v1/products",
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
            None,
        )?;
        let products: Vec<Product> = self.fetch(request).await?;

        self.inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        let cache_key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(Some(*product));
        }

        let request = self.request(
            Method::GET,
            "/rest/v1/products",
            &[("id", format!("eq.{id}")), ("select", "*".to_string())],
            None,
        )?;
        let rows: Vec<Product> = self.fetch(request).await?;
        let product = rows.into_iter().next();

        if let Some(product) = &product {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }
        Ok(product)
    }

    #[instrument(skip(self, session), fields(product_id = %id))]
    async fn set_stock(
        &self,
        session: &Session,
        id: ProductId,
        stock: u32,
    ) -> Result<Product, BackendError> {
        let request = self
            .request(
                Method::PATCH,
                "/rest/v1/products",
                &[("id", format!("eq.{id}"))],
                Some(session),
            )?
            .header("Prefer", "return=representation")
            .json(&json!({ "stock": stock }));
        let product = self.fetch_one(request, "product").await?;
        self.inner.cache.invalidate_all();
        Ok(product)
    }
}

impl CouponBackend for RestBackend {
    #[instrument(skip(self))]
    async fn find_active_coupon(&self, code: &str) -> Result<Option<Coupon>, BackendError> {
        let request = self.request(
            Method::GET,
            "/rest/v1/coupons",
            &[
                ("code", format!("eq.{code}")),
                ("active", "eq.true".to_string()),
                ("select", "*".to_string()),
            ],
            None,
        )?;
        let rows: Vec<Coupon> = self.fetch(request).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, session))]
    async fn increment_coupon_usage(
        &self,
        session: &Session,
        code: &str,
    ) -> Result<(), BackendError> {
        let request = self
            .request(
                Method::POST,
                "/rest/v1/rpc/increment_coupon_usage",
                &[],
                Some(session),
            )?
            .json(&json!({ "coupon_code": code }));
        self.execute(request).await?;
        Ok(())
    }

    #[instrument(skip(self, session, coupon), fields(code = %coupon.code))]
    async fn upsert_coupon(
        &self,
        session: &Session,
        coupon: Coupon,
    ) -> Result<Coupon, BackendError> {
        let request = self
            .request(
                Method::POST,
                "/rest/v1/coupons",
                &[("on_conflict", "code".to_string())],
                Some(session),
            )?
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&coupon);
        self.fetch_one(request, "coupon").await
    }
}

impl OrderBackend for RestBackend {
    #[instrument(skip(self, session, order), fields(user_id = %session.user_id))]
    async fn create_order(
        &self,
        session: &Session,
        order: NewOrder,
    ) -> Result<Order, BackendError> {
        let request = self
            .request(Method::POST, "/rest/v1/orders", &[], Some(session))?
            .header("Prefer", "return=representation")
            .json(&order);
        let created = self.fetch_one(request, "order").await?;
        // Stock changed server-side.
        self.inner.cache.invalidate_all();
        Ok(created)
    }

    #[instrument(skip(self, session), fields(order_id = %id))]
    async fn get_order(
        &self,
        session: &Session,
        id: OrderId,
    ) -> Result<Option<Order>, BackendError> {
        let request = self.request(
            Method::GET,
            "/rest/v1/orders",
            &[("id", format!("eq.{id}")), ("select", "*".to_string())],
            Some(session),
        )?;
        let rows: Vec<Order> = self.fetch(request).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn list_orders_for_user(&self, session: &Session) -> Result<Vec<Order>, BackendError> {
        let request = self.request(
            Method::GET,
            "/rest/v1/orders",
            &[
                ("user_id", format!("eq.{}", session.user_id)),
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
            Some(session),
        )?;
        self.fetch(request).await
    }

    #[instrument(skip(self, session))]
    async fn list_all_orders(&self, session: &Session) -> Result<Vec<Order>, BackendError> {
        let request = self.request(
            Method::GET,
            "/rest/v1/orders",
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
            Some(session),
        )?;
        self.fetch(request).await
    }

    #[instrument(skip(self, session), fields(order_id = %id, status = %status))]
    async fn update_order_status(
        &self,
        session: &Session,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, BackendError> {
        let request = self
            .request(
                Method::PATCH,
                "/rest/v1/orders",
                &[("id", format!("eq.{id}"))],
                Some(session),
            )?
            .header("Prefer", "return=representation")
            .json(&json!({ "status": status, "updated_at": Utc::now() }));
        self.fetch_one(request, "order").await
    }

    #[instrument(skip(self, session), fields(order_id = %id))]
    async fn cancel_order(&self, session: &Session, id: OrderId) -> Result<Order, BackendError> {
        let request = self
            .request(
                Method::PATCH,
                "/rest/v1/orders",
                &[
                    ("id", format!("eq.{id}")),
                    ("user_id", format!("eq.{}", session.user_id)),
                    ("status", "in.(pending,processing)".to_string()),
                ],
                Some(session),
            )?
            .header("Prefer", "return=representation")
            .json(&json!({ "status": OrderStatus::Cancelled, "updated_at": Utc::now() }));
        let rows: Vec<Order> = self.fetch(request).await?;
        let order = rows
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Conflict("order can no longer be cancelled".to_string()))?;
        self.inner.cache.invalidate_all();
        Ok(order)
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn subscribe_order_updates(
        &self,
        session: &Session,
    ) -> Result<OrderUpdates, BackendError> {
        let (sender, receiver) = broadcast::channel(REALTIME_CAPACITY);
        tokio::spawn(self.clone().poll_orders(session.clone(), sender));
        Ok(OrderUpdates::new(session.user_id, receiver))
    }
}

impl FavoriteBackend for RestBackend {
    #[instrument(skip(self))]
    async fn list_favorites(&self, user_id: UserId) -> Result<Vec<ProductId>, BackendError> {
        let request = self.request(
            Method::GET,
            "/rest/v1/favorites",
            &[
                ("user_id", format!("eq.{user_id}")),
                ("select", "product_id".to_string()),
            ],
            None,
        )?;
        let rows: Vec<FavoriteRow> = self.fetch(request).await?;
        Ok(rows.into_iter().map(|row| row.product_id).collect())
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn add_favorite(
        &self,
        session: &Session,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        let request = self
            .request(Method::POST, "/rest/v1/favorites", &[], Some(session))?
            .header("Prefer", "resolution=ignore-duplicates")
            .json(&json!({ "user_id": session.user_id, "product_id": product_id }));
        self.execute(request).await?;
        Ok(())
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn remove_favorite(
        &self,
        session: &Session,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        let request = self.request(
            Method::DELETE,
            "/rest/v1/favorites",
            &[
                ("user_id", format!("eq.{}", session.user_id)),
                ("product_id", format!("eq.{product_id}")),
            ],
            Some(session),
        )?;
        self.execute(request).await?;
        Ok(())
    }
}

impl FileStorage for RestBackend {
    #[instrument(skip(self, session, file), fields(size = file.bytes.len()))]
    async fn upload(
        &self,
        session: &Session,
        bucket: &str,
        path: &str,
        file: &ImageUpload,
    ) -> Result<String, BackendError> {
        let request = self
            .request(
                Method::POST,
                &format!("/storage/v1/object/{bucket}/{path}"),
                &[],
                Some(session),
            )?
            .header("Content-Type", file.content_type.as_str())
            .body(file.bytes.clone());
        self.execute(request).await?;

        self.inner
            .base_url
            .join(&format!("/storage/v1/object/public/{bucket}/{path}"))
            .map(String::from)
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}
