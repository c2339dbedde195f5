//! Product reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vitrine_core::{ProductId, ReviewId, UserId};

/// A published review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub author_name: String,
    /// 1 to 5 stars.
    pub rating: u8,
    pub title: String,
    pub body: String,
    /// Public URLs of uploaded images.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub helpful_count: u32,
    pub created_at: DateTime<Utc>,
}

/// A review being written by the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDraft {
    pub product_id: ProductId,
    pub rating: u8,
    pub title: String,
    pub body: String,
    pub images: Vec<ImageUpload>,
}

/// A file to upload to backend storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
