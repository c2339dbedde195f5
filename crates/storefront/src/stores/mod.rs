//! Client-side state stores.
//!
//! Each store owns its slice of state and its local storage key, and is
//! mutated only through its own `&mut self` methods.

pub mod cart;
pub mod compare;
pub mod favorites;
pub mod history;
pub mod notifications;
pub mod reviews;

pub use cart::{AddOutcome, CartItem, CartRejection, CartStore};
pub use compare::{CompareList, CompareRejection, MAX_COMPARE};
pub use favorites::{FavoriteError, FavoritesStore};
pub use history::{BrowsingHistory, RecentSearches, Theme};
pub use notifications::{NativeNotifier, NativePermission, NotificationCenter};
pub use reviews::{ReviewError, ReviewStore};
