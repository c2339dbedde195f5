//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for everything the storefront surfaces
//! to a user. [`AppError::user_message`] is what gets shown;
//! [`AppError::report`] captures backend and internal failures to Sentry.

use thiserror::Error;

use crate::backend::BackendError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::services::admin::AdminError;
use crate::services::chat::ChatError;
use crate::services::orders::OrderError;
use crate::storage::StorageError;
use crate::stores::{FavoriteError, ReviewError};

/// Shown when the real cause must not leak.
const GENERIC_MESSAGE: &str = "Something went wrong, please try again";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Backend operation failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Checkout could not proceed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Admin operation failed.
    #[error("Admin error: {0}")]
    Admin(#[from] AdminError),

    /// Review could not be submitted.
    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    /// Favorites operation failed.
    #[error("Favorites error: {0}")]
    Favorite(#[from] FavoriteError),

    /// Assistant chat failed.
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The backend error underneath, if any.
    #[must_use]
    pub const fn backend_cause(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(e)
            | Self::Order(OrderError::Backend(e))
            | Self::Checkout(CheckoutError::Order(OrderError::Backend(e)))
            | Self::Admin(AdminError::Backend(e))
            | Self::Review(ReviewError::Upload(e))
            | Self::Favorite(FavoriteError::Backend(e)) => Some(e),
            _ => None,
        }
    }

    /// Whether this is a failure of ours or of a collaborator rather than
    /// something the user can fix.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        if let Some(cause) = self.backend_cause() {
            return !matches!(
                cause,
                BackendError::InvalidCredentials
                    | BackendError::Unauthorized(_)
                    | BackendError::NotFound(_)
                    | BackendError::Conflict(_)
                    | BackendError::Rejected(_)
                    | BackendError::RateLimited(_)
            );
        }
        matches!(
            self,
            Self::Config(_)
                | Self::Storage(_)
                | Self::Internal(_)
                | Self::Chat(
                    ChatError::Http(_) | ChatError::Parse(_) | ChatError::Unavailable { .. }
                )
        )
    }

    /// Message safe to show to the user; internal details are never included.
    #[must_use]
    pub fn user_message(&self) -> String {
        if let Some(cause) = self.backend_cause() {
            return match cause {
                BackendError::InvalidCredentials => "Invalid email or password".to_string(),
                BackendError::Unauthorized(_) => {
                    "Your session has expired, please sign in again".to_string()
                }
                BackendError::NotFound(_) => "Not found".to_string(),
                BackendError::Conflict(_) => {
                    "Some items are no longer available in the requested quantity".to_string()
                }
                BackendError::Rejected(reason) => reason.clone(),
                BackendError::RateLimited(_) => {
                    "Too many requests, please wait a moment".to_string()
                }
                BackendError::Http(_) | BackendError::Api { .. } | BackendError::Parse(_) => {
                    GENERIC_MESSAGE.to_string()
                }
            };
        }
        match self {
            Self::Checkout(CheckoutError::InvalidAddress(errors)) => errors
                .iter()
                .map(|(field, message)| format!("{field}: {message}"))
                .collect::<Vec<_>>()
                .join("; "),
            Self::Chat(
                ChatError::Http(_) | ChatError::Parse(_) | ChatError::Unavailable { .. },
            ) => "The assistant is unavailable right now".to_string(),
            Self::Config(_) | Self::Storage(_) | Self::Internal(_) => GENERIC_MESSAGE.to_string(),
            Self::Checkout(e) => e.to_string(),
            Self::Order(e) => e.to_string(),
            Self::Admin(e) => e.to_string(),
            Self::Review(e) => e.to_string(),
            Self::Favorite(e) => e.to_string(),
            Self::Chat(e) => e.to_string(),
            Self::NotFound(_) => "Not found".to_string(),
            Self::BadRequest(message) => message.clone(),
            Self::Backend(_) => GENERIC_MESSAGE.to_string(),
        }
    }

    /// Capture internal errors to Sentry and log them; user errors are only
    /// logged at debug.
    pub fn report(&self) {
        if self.is_internal() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront error"
            );
        } else {
            tracing::debug!(error = %self, "User-facing error");
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
