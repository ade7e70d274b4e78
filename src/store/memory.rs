//! In-memory notification store.
//!
//! Used by `--storage memory` for local development and by the test suite.
//! Each mutation runs entirely under one write guard with no await points
//! inside, which gives the same all-or-nothing behaviour as a transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::NotificationStore;
use crate::models::notification::{
    ChatPurge, DeleteOutcome, NewNotification, Notification, PageRequest, ReadOutcome,
};

/// Shared, cheaply-cloneable store.
#[derive(Clone, Default)]
pub struct MemoryStore(Arc<RwLock<HashMap<Uuid, Notification>>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an already-built notification as-is (fixtures, backdated rows).
    pub async fn put(&self, notification: Notification) {
        self.0.write().await.insert(notification.id, notification);
    }

    /// Total rows held, read or unread.
    pub async fn len(&self) -> usize {
        self.0.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.0.read().await.is_empty()
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Notification>> {
        Ok(self.0.read().await.get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: &PageRequest,
    ) -> anyhow::Result<Vec<Notification>> {
        let map = self.0.read().await;
        let mut rows: Vec<&Notification> = map
            .values()
            .filter(|n| n.user_id == user_id && (!page.unread_only || !n.is_read))
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }

    async fn insert(&self, new: NewNotification) -> anyhow::Result<Notification> {
        let notification = new.into_notification(Utc::now());
        self.0
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn unread_count(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let map = self.0.read().await;
        Ok(map
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<ReadOutcome> {
        let mut map = self.0.write().await;
        Ok(match map.get_mut(&id) {
            Some(n) if n.user_id == user_id => {
                if n.is_read {
                    ReadOutcome::AlreadyRead
                } else {
                    n.is_read = true;
                    n.read_at = Some(Utc::now());
                    ReadOutcome::Marked
                }
            }
            _ => ReadOutcome::NotFound,
        })
    }

    async fn mark_chat_read(&self, chat_id: Uuid, user_id: Uuid) -> anyhow::Result<u64> {
        let mut map = self.0.write().await;
        let now = Utc::now();
        let mut marked = 0;
        for n in map
            .values_mut()
            .filter(|n| n.chat_id == chat_id && n.user_id == user_id && !n.is_read)
        {
            n.is_read = true;
            n.read_at = Some(now);
            marked += 1;
        }
        Ok(marked)
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<DeleteOutcome> {
        let mut map = self.0.write().await;
        let owned = map.get(&id).map_or(false, |n| n.user_id == user_id);
        if !owned {
            return Ok(DeleteOutcome::NotFound);
        }
        Ok(match map.remove(&id) {
            Some(n) => DeleteOutcome::Deleted {
                was_unread: !n.is_read,
            },
            None => DeleteOutcome::NotFound,
        })
    }

    async fn delete_for_chat(&self, chat_id: Uuid) -> anyhow::Result<ChatPurge> {
        let mut map = self.0.write().await;
        let mut purge = ChatPurge::default();
        map.retain(|_, n| {
            if n.chat_id != chat_id {
                return true;
            }
            purge.removed += 1;
            if !n.is_read {
                purge.affected_users.push(n.user_id);
            }
            false
        });
        purge.affected_users.sort();
        purge.affected_users.dedup();
        Ok(purge)
    }

    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut map = self.0.write().await;
        let before = map.len();
        map.retain(|_, n| !(n.is_read && n.read_at.map_or(false, |at| at < cutoff)));
        Ok((before - map.len()) as u64)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
