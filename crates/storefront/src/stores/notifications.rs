//! Per-user notification center.
//!
//! Keeps the newest [`MAX_NOTIFICATIONS`] entries, newest first. Entries can be
//! mirrored to the operating system through a [`NativeNotifier`], but only
//! after the user explicitly granted permission.

use std::sync::Arc;

use vitrine_core::{NotificationId, UserId};

use crate::models::Notification;
use crate::storage::{self, SharedStore, keys};

/// Oldest entries are evicted beyond this count.
pub const MAX_NOTIFICATIONS: usize = 50;

/// State of the OS-level notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NativePermission {
    /// Never asked.
    #[default]
    Default,
    Granted,
    Denied,
}

/// OS-level notification sink.
pub trait NativeNotifier: Send + Sync {
    /// Ask the user for permission. Only called on explicit request.
    fn request_permission(&self) -> NativePermission;

    /// Display a notification.
    fn show(&self, notification: &Notification);
}

/// Notifications of one signed-in user.
pub struct NotificationCenter {
    user_id: UserId,
    items: Vec<Notification>,
    permission: NativePermission,
    notifier: Option<Arc<dyn NativeNotifier>>,
    store: SharedStore,
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("user_id", &self.user_id)
            .field("items", &self.items.len())
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

impl NotificationCenter {
    /// Load the user's stored notifications.
    #[must_use]
    pub fn load(store: SharedStore, user_id: UserId) -> Self {
        let mut items: Vec<Notification> =
            storage::load_or_default(store.as_ref(), &keys::notifications(user_id));
        items.truncate(MAX_NOTIFICATIONS);
        Self {
            user_id,
            items,
            permission: NativePermission::Default,
            notifier: None,
            store,
        }
    }

    /// Attach an OS notifier. Nothing is shown until permission is granted.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NativeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn save(&self) {
        storage::save_best_effort(
            self.store.as_ref(),
            &keys::notifications(self.user_id),
            &self.items,
        );
    }

    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Newest first.
    #[must_use]
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    #[must_use]
    pub const fn native_permission(&self) -> NativePermission {
        self.permission
    }

    /// Ask for OS notification permission. No-op without a notifier.
    pub fn request_native_permission(&mut self) -> NativePermission {
        if let Some(notifier) = &self.notifier {
            self.permission = notifier.request_permission();
        }
        self.permission
    }

    /// Store a notification, evicting the oldest beyond the cap.
    pub fn push(&mut self, notification: Notification) {
        if self.permission == NativePermission::Granted
            && let Some(notifier) = &self.notifier
        {
            notifier.show(&notification);
        }
        self.items.insert(0, notification);
        self.items.truncate(MAX_NOTIFICATIONS);
        self.save();
    }

    pub fn mark_read(&mut self, id: NotificationId) {
        if let Some(n) = self.items.iter_mut().find(|n| n.id == id) {
            n.read = true;
            self.save();
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.items {
            n.read = true;
        }
        self.save();
    }

    pub fn remove(&mut self, id: NotificationId) {
        self.items.retain(|n| n.id != id);
        self.save();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.save();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use vitrine_core::NotificationKind;

    use super::*;
    use crate::storage::MemoryStore;

    struct RecordingNotifier {
        answer: NativePermission,
        shown: Mutex<Vec<String>>,
    }

    impl NativeNotifier for RecordingNotifier {
        fn request_permission(&self) -> NativePermission {
            self.answer
        }

        fn show(&self, notification: &Notification) {
            self.shown
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(notification.title.clone());
        }
    }

    fn notifier(answer: NativePermission) -> Arc<RecordingNotifier> {
        Arc::new(RecordingNotifier {
            answer,
            shown: Mutex::new(Vec::new()),
        })
    }

    fn note(title: &str) -> Notification {
        Notification::new(NotificationKind::System, title, "message")
    }

    #[test]
    fn test_capped_at_fifty_oldest_evicted() {
        let mut center = NotificationCenter::load(MemoryStore::shared(), UserId::generate());
        for i in 0..60 {
            center.push(note(&format!("n{i}")));
        }
        assert_eq!(center.items().len(), MAX_NOTIFICATIONS);
        assert_eq!(center.items()[0].title, "n59");
        assert_eq!(center.items()[MAX_NOTIFICATIONS - 1].title, "n10");
    }

    #[test]
    fn test_read_flags_and_unread_count() {
        let mut center = NotificationCenter::load(MemoryStore::shared(), UserId::generate());
        center.push(note("a"));
        center.push(note("b"));
        assert_eq!(center.unread_count(), 2);

        let first = center.items()[0].id;
        center.mark_read(first);
        assert_eq!(center.unread_count(), 1);
        center.mark_all_read();
        assert_eq!(center.unread_count(), 0);

        center.remove(first);
        assert_eq!(center.items().len(), 1);
        center.clear();
        assert!(center.items().is_empty());
    }

    #[test]
    fn test_stored_per_user() {
        let store = MemoryStore::shared();
        let ana = UserId::generate();
        let bia = UserId::generate();
        NotificationCenter::load(store.clone(), ana).push(note("for ana"));

        assert_eq!(NotificationCenter::load(store.clone(), ana).items().len(), 1);
        assert!(NotificationCenter::load(store, bia).items().is_empty());
    }

    #[test]
    fn test_native_mirroring_requires_explicit_grant() {
        let native = notifier(NativePermission::Granted);
        let mut center = NotificationCenter::load(MemoryStore::shared(), UserId::generate())
            .with_notifier(native.clone());

        center.push(note("before"));
        assert!(native.shown.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty());

        assert_eq!(center.request_native_permission(), NativePermission::Granted);
        center.push(note("after"));
        let shown = native.shown.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(shown.as_slice(), ["after".to_string()]);
    }

    #[test]
    fn test_denied_permission_never_mirrors() {
        let native = notifier(NativePermission::Denied);
        let mut center = NotificationCenter::load(MemoryStore::shared(), UserId::generate())
            .with_notifier(native.clone());
        center.request_native_permission();
        center.push(note("quiet"));
        assert!(native.shown.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty());
    }
}
