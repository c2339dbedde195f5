//! Favorites (wishlist) of the signed-in user.
//!
//! The backend table is the source of truth; ids are mirrored to local storage
//! so the wishlist renders before the backend answers. A wishlist can be shared
//! through a code derived from the owner's id.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;
use tracing::instrument;

use vitrine_core::{ProductId, UserId};

use crate::backend::{BackendError, FavoriteBackend};
use crate::models::Session;
use crate::storage::{self, SharedStore, keys};

/// Errors that can occur when managing favorites.
#[derive(Debug, Error)]
pub enum FavoriteError {
    /// Favorites need a signed-in user.
    #[error("sign in to save favorites")]
    SignInRequired,

    /// The share code does not decode to a user.
    #[error("invalid wishlist link")]
    InvalidShareCode,

    /// Backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Encode a user's id as a URL-safe wishlist code.
#[must_use]
pub fn share_code(user_id: UserId) -> String {
    URL_SAFE_NO_PAD.encode(user_id.as_uuid().as_bytes())
}

/// Decode a wishlist code back to its owner.
///
/// # Errors
///
/// Returns [`FavoriteError::InvalidShareCode`] if the code is malformed.
pub fn decode_share_code(code: &str) -> Result<UserId, FavoriteError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(code.trim())
        .map_err(|_| FavoriteError::InvalidShareCode)?;
    uuid::Uuid::from_slice(&bytes)
        .map(UserId::new)
        .map_err(|_| FavoriteError::InvalidShareCode)
}

/// Product ids in a shared wishlist.
///
/// # Errors
///
/// Returns an error if the code is malformed or the backend call fails.
#[instrument(skip(backend))]
pub async fn resolve_shared<B: FavoriteBackend>(
    backend: &B,
    code: &str,
) -> Result<Vec<ProductId>, FavoriteError> {
    let owner = decode_share_code(code)?;
    Ok(backend.list_favorites(owner).await?)
}

/// The signed-in user's favorites.
pub struct FavoritesStore {
    owner: Option<UserId>,
    ids: Vec<ProductId>,
    store: SharedStore,
}

impl std::fmt::Debug for FavoritesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavoritesStore")
            .field("owner", &self.owner)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl FavoritesStore {
    /// An empty store with no owner.
    #[must_use]
    pub const fn new(store: SharedStore) -> Self {
        Self {
            owner: None,
            ids: Vec::new(),
            store,
        }
    }

    fn save(&self) {
        if let Some(owner) = self.owner {
            storage::save_best_effort(self.store.as_ref(), &keys::favorites(owner), &self.ids);
        }
    }

    /// Show the mirrored ids, then replace them with the backend's list.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails; the mirrored ids stay loaded.
    #[instrument(skip(self, backend, session), fields(user_id = %session.user_id))]
    pub async fn load<B: FavoriteBackend>(
        &mut self,
        backend: &B,
        session: &Session,
    ) -> Result<(), FavoriteError> {
        self.owner = Some(session.user_id);
        self.ids = storage::load_or_default(self.store.as_ref(), &keys::favorites(session.user_id));
        self.ids = backend.list_favorites(session.user_id).await?;
        self.save();
        Ok(())
    }

    /// Forget the user (sign-out). The local mirror is kept.
    pub fn unload(&mut self) {
        self.owner = None;
        self.ids.clear();
    }

    #[must_use]
    pub fn ids(&self) -> &[ProductId] {
        &self.ids
    }

    #[must_use]
    pub fn is_favorite(&self, product_id: ProductId) -> bool {
        self.ids.contains(&product_id)
    }

    /// Add or remove a favorite. Returns whether the product is now a favorite.
    ///
    /// # Errors
    ///
    /// Returns [`FavoriteError::SignInRequired`] without a session, or the
    /// backend error; state is unchanged on error.
    #[instrument(skip(self, backend, session))]
    pub async fn toggle<B: FavoriteBackend>(
        &mut self,
        backend: &B,
        session: Option<&Session>,
        product_id: ProductId,
    ) -> Result<bool, FavoriteError> {
        let session = session.ok_or(FavoriteError::SignInRequired)?;
        if self.owner != Some(session.user_id) {
            self.load(backend, session).await?;
        }

        let now_favorite = if self.is_favorite(product_id) {
            backend.remove_favorite(session, product_id).await?;
            self.ids.retain(|id| *id != product_id);
            false
        } else {
            backend.add_favorite(session, product_id).await?;
            self.ids.push(product_id);
            true
        };
        self.save();
        Ok(now_favorite)
    }

    /// This user's share code.
    #[must_use]
    pub fn share_code(&self) -> Option<String> {
        self.owner.map(share_code)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use vitrine_core::Email;

    use super::*;
    use crate::backend::{AuthBackend, InMemoryBackend};
    use crate::models::Credentials;
    use crate::storage::MemoryStore;

    async fn signed_in(backend: &InMemoryBackend) -> Session {
        backend
            .sign_up(
                &Credentials {
                    email: Email::parse("ana@example.com").unwrap(),
                    password: SecretString::from("correct-horse"),
                },
                "Ana",
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_share_code_roundtrip() {
        let user = UserId::generate();
        let code = share_code(user);
        assert_eq!(code.len(), 22);
        assert_eq!(decode_share_code(&code).unwrap(), user);
        assert_eq!(share_code(user), code);
    }

    #[test]
    fn test_bad_share_code() {
        assert!(matches!(
            decode_share_code("not a code!"),
            Err(FavoriteError::InvalidShareCode)
        ));
        assert!(matches!(
            decode_share_code("AAAA"),
            Err(FavoriteError::InvalidShareCode)
        ));
    }

    #[tokio::test]
    async fn test_toggle_requires_session() {
        let backend = InMemoryBackend::new();
        let mut favorites = FavoritesStore::new(MemoryStore::shared());
        let result = favorites
            .toggle(&backend, None, ProductId::generate())
            .await;
        assert!(matches!(result, Err(FavoriteError::SignInRequired)));
        assert!(favorites.ids().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_and_share() {
        let backend = InMemoryBackend::new();
        let session = signed_in(&backend).await;
        let store = MemoryStore::shared();
        let mut favorites = FavoritesStore::new(store.clone());
        let product = ProductId::generate();

        assert!(favorites.toggle(&backend, Some(&session), product).await.unwrap());
        assert!(favorites.is_favorite(product));

        let code = favorites.share_code().unwrap();
        assert_eq!(resolve_shared(&backend, &code).await.unwrap(), vec![product]);

        let mirrored: Vec<ProductId> =
            storage::load_or_default(store.as_ref(), &keys::favorites(session.user_id));
        assert_eq!(mirrored, vec![product]);

        assert!(!favorites.toggle(&backend, Some(&session), product).await.unwrap());
        assert!(resolve_shared(&backend, &code).await.unwrap().is_empty());
    }
}
