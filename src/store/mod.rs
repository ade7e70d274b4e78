pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::notification::{
    ChatPurge, DeleteOutcome, NewNotification, Notification, PageRequest, ReadOutcome,
};

/// Abstraction over notification persistence.
/// Implementations: PgStore (PostgreSQL), MemoryStore (dev mode and tests).
///
/// Every mutating call is all-or-nothing: either every affected row changes
/// or none does, even if the calling future is dropped midway.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Notification>>;

    /// Newest first, ties broken by id so pages never overlap.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: &PageRequest,
    ) -> anyhow::Result<Vec<Notification>>;

    async fn insert(&self, new: NewNotification) -> anyhow::Result<Notification>;

    async fn unread_count(&self, user_id: Uuid) -> anyhow::Result<i64>;

    /// Owner-scoped. A notification owned by someone else is `NotFound`.
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<ReadOutcome>;

    /// Returns how many rows flipped from unread to read.
    async fn mark_chat_read(&self, chat_id: Uuid, user_id: Uuid) -> anyhow::Result<u64>;

    /// Owner-scoped. A notification owned by someone else is `NotFound`.
    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<DeleteOutcome>;

    async fn delete_for_chat(&self, chat_id: Uuid) -> anyhow::Result<ChatPurge>;

    /// Removes read notifications whose `read_at` is older than `cutoff`.
    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;

    /// Cheap liveness probe used by `/readyz`.
    async fn ping(&self) -> anyhow::Result<()>;
}
