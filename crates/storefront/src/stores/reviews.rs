//! Product reviews, cached in local storage.
//!
//! One review per `(user, product)`, checked when writing. Images go to the
//! backend's file storage and the review keeps their public URLs.

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use vitrine_core::{ProductId, ReviewId};

use crate::backend::{BackendError, FileStorage};
use crate::models::{Review, ReviewDraft, Session};
use crate::storage::{self, SharedStore, keys};

/// Bucket holding review images.
pub const REVIEW_IMAGES_BUCKET: &str = "review-images";

/// Most images attached to one review.
pub const MAX_REVIEW_IMAGES: usize = 5;

/// Errors that can occur when submitting a review.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("sign in to write a review")]
    SignInRequired,

    #[error("rating must be between 1 and 5")]
    InvalidRating,

    #[error("title is required")]
    MissingTitle,

    #[error("review text is required")]
    MissingBody,

    #[error("at most {max} images per review")]
    TooManyImages { max: usize },

    #[error("you already reviewed this product")]
    AlreadyReviewed,

    #[error("image upload failed: {0}")]
    Upload(#[from] BackendError),
}

/// Local review cache.
pub struct ReviewStore {
    reviews: Vec<Review>,
    store: SharedStore,
}

impl std::fmt::Debug for ReviewStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewStore")
            .field("reviews", &self.reviews.len())
            .finish_non_exhaustive()
    }
}

impl ReviewStore {
    #[must_use]
    pub fn load(store: SharedStore) -> Self {
        let reviews = storage::load_or_default(store.as_ref(), keys::REVIEWS);
        Self { reviews, store }
    }

    fn save(&self) {
        storage::save_best_effort(self.store.as_ref(), keys::REVIEWS, &self.reviews);
    }

    /// Validate, upload images and store a review.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`ReviewError::AlreadyReviewed`], or the
    /// upload failure. Nothing is stored on error.
    #[instrument(skip(self, backend, session, draft), fields(product_id = %draft.product_id))]
    pub async fn submit<B: FileStorage>(
        &mut self,
        backend: &B,
        session: Option<&Session>,
        draft: ReviewDraft,
    ) -> Result<Review, ReviewError> {
        let session = session.ok_or(ReviewError::SignInRequired)?;
        if !(1..=5).contains(&draft.rating) {
            return Err(ReviewError::InvalidRating);
        }
        if draft.title.trim().is_empty() {
            return Err(ReviewError::MissingTitle);
        }
        if draft.body.trim().is_empty() {
            return Err(ReviewError::MissingBody);
        }
        if draft.images.len() > MAX_REVIEW_IMAGES {
            return Err(ReviewError::TooManyImages {
                max: MAX_REVIEW_IMAGES,
            });
        }
        if self
            .reviews
            .iter()
            .any(|r| r.product_id == draft.product_id && r.user_id == session.user_id)
        {
            tracing::warn!("Duplicate review refused");
            return Err(ReviewError::AlreadyReviewed);
        }

        let id = ReviewId::generate();
        let mut images = Vec::with_capacity(draft.images.len());
        for (index, image) in draft.images.iter().enumerate() {
            let path = format!("{}/{id}/{index}-{}", session.user_id, image.file_name);
            images.push(
                backend
                    .upload(session, REVIEW_IMAGES_BUCKET, &path, image)
                    .await?,
            );
        }

        let review = Review {
            id,
            product_id: draft.product_id,
            user_id: session.user_id,
            author_name: session.display_name.clone(),
            rating: draft.rating,
            title: draft.title.trim().to_string(),
            body: draft.body.trim().to_string(),
            images,
            helpful_count: 0,
            created_at: Utc::now(),
        };
        self.reviews.push(review.clone());
        self.save();
        Ok(review)
    }

    /// Reviews of a product, newest first.
    #[must_use]
    pub fn for_product(&self, product_id: ProductId) -> Vec<&Review> {
        let mut reviews: Vec<&Review> = self
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reviews
    }

    /// Mean rating of a product, `None` without reviews.
    #[must_use]
    pub fn average_rating(&self, product_id: ProductId) -> Option<f64> {
        let ratings: Vec<f64> = self
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .map(|r| f64::from(r.rating))
            .collect();
        if ratings.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)] // Review counts are tiny
        let count = ratings.len() as f64;
        Some(ratings.iter().sum::<f64>() / count)
    }

    /// Count one "helpful" vote. Returns `false` for unknown reviews.
    pub fn mark_helpful(&mut self, review_id: ReviewId) -> bool {
        let Some(review) = self.reviews.iter_mut().find(|r| r.id == review_id) else {
            return false;
        };
        review.helpful_count = review.helpful_count.saturating_add(1);
        self.save();
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use vitrine_core::Email;

    use super::*;
    use crate::backend::{AuthBackend, InMemoryBackend};
    use crate::models::{Credentials, ImageUpload};
    use crate::storage::MemoryStore;

    async fn session(backend: &InMemoryBackend, email: &str) -> Session {
        backend
            .sign_up(
                &Credentials {
                    email: Email::parse(email).unwrap(),
                    password: SecretString::from("correct-horse"),
                },
                "Ana",
            )
            .await
            .unwrap()
    }

    fn draft(product_id: ProductId, rating: u8) -> ReviewDraft {
        ReviewDraft {
            product_id,
            rating,
            title: "Muito bom".to_string(),
            body: "Chegou rápido e funciona bem.".to_string(),
            images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_one_review_per_user_and_product() {
        let backend = InMemoryBackend::new();
        let ana = session(&backend, "ana@example.com").await;
        let mut reviews = ReviewStore::load(MemoryStore::shared());
        let product = ProductId::generate();

        reviews
            .submit(&backend, Some(&ana), draft(product, 5))
            .await
            .unwrap();
        let again = reviews.submit(&backend, Some(&ana), draft(product, 4)).await;
        assert!(matches!(again, Err(ReviewError::AlreadyReviewed)));
        assert_eq!(reviews.for_product(product).len(), 1);
    }

    #[tokio::test]
    async fn test_validation() {
        let backend = InMemoryBackend::new();
        let ana = session(&backend, "ana@example.com").await;
        let mut reviews = ReviewStore::load(MemoryStore::shared());
        let product = ProductId::generate();

        assert!(matches!(
            reviews.submit(&backend, None, draft(product, 5)).await,
            Err(ReviewError::SignInRequired)
        ));
        assert!(matches!(
            reviews.submit(&backend, Some(&ana), draft(product, 0)).await,
            Err(ReviewError::InvalidRating)
        ));
        assert!(matches!(
            reviews.submit(&backend, Some(&ana), draft(product, 6)).await,
            Err(ReviewError::InvalidRating)
        ));
        let mut blank = draft(product, 3);
        blank.title = "  ".to_string();
        assert!(matches!(
            reviews.submit(&backend, Some(&ana), blank).await,
            Err(ReviewError::MissingTitle)
        ));
        assert!(reviews.for_product(product).is_empty());
    }

    #[tokio::test]
    async fn test_images_are_uploaded() {
        let backend = InMemoryBackend::new();
        let ana = session(&backend, "ana@example.com").await;
        let mut reviews = ReviewStore::load(MemoryStore::shared());
        let mut with_image = draft(ProductId::generate(), 4);
        with_image.images.push(ImageUpload {
            file_name: "foto.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        });

        let review = reviews
            .submit(&backend, Some(&ana), with_image)
            .await
            .unwrap();
        assert_eq!(review.images.len(), 1);
        assert!(review.images[0].starts_with("memory://review-images/"));
        assert!(review.images[0].ends_with("0-foto.jpg"));
    }

    #[tokio::test]
    async fn test_average_and_helpful() {
        let backend = InMemoryBackend::new();
        let ana = session(&backend, "ana@example.com").await;
        let bia = session(&backend, "bia@example.com").await;
        let store = MemoryStore::shared();
        let mut reviews = ReviewStore::load(store.clone());
        let product = ProductId::generate();

        assert!(reviews.average_rating(product).is_none());
        let first = reviews
            .submit(&backend, Some(&ana), draft(product, 5))
            .await
            .unwrap();
        reviews
            .submit(&backend, Some(&bia), draft(product, 2))
            .await
            .unwrap();
        assert!((reviews.average_rating(product).unwrap() - 3.5).abs() < f64::EPSILON);

        assert!(reviews.mark_helpful(first.id));
        assert!(!reviews.mark_helpful(ReviewId::generate()));

        let reloaded = ReviewStore::load(store);
        let cached = reloaded.for_product(product);
        assert_eq!(cached.len(), 2);
        assert_eq!(
            cached.iter().find(|r| r.id == first.id).unwrap().helpful_count,
            1
        );
    }
}
