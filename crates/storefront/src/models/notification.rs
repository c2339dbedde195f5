//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vitrine_core::{NotificationId, NotificationKind};

/// A notification shown in the notification center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    /// Route to open when the notification is clicked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create an unread notification stamped with the current time.
    #[must_use]
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            kind,
            title: title.into(),
            message: message.into(),
            read: false,
            link: None,
            created_at: Utc::now(),
        }
    }

    /// Attach a deep link.
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}
