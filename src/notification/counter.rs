use std::sync::Arc;

use uuid::Uuid;

use crate::store::NotificationStore;

/// Per-user unread count, always read straight from the store.
///
/// Nothing is cached, so there is nothing to invalidate when a notification
/// is inserted, read, or deleted.
#[derive(Clone)]
pub struct UnreadCounter {
    store: Arc<dyn NotificationStore>,
}

impl UnreadCounter {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub async fn get_unread_count(&self, user_id: Uuid) -> anyhow::Result<i64> {
        self.store.unread_count(user_id).await
    }
}
