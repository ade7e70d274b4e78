//! ReadStateReconciler: every mutation that can move a user's unread count.
//!
//! Each operation commits to the store first, then recounts and pushes.
//! A store error aborts the operation and reaches the caller. Anything that
//! fails after the commit (recount or push) is logged and swallowed: the
//! read state is already durable and the client re-syncs on reconnect.

use std::sync::Arc;

use uuid::Uuid;

use super::counter::UnreadCounter;
use super::fanout::FanoutNotifier;
use crate::errors::AppError;
use crate::middleware::auth::RequestContext;
use crate::middleware::metrics;
use crate::models::notification::{
    ChatPurge, DeleteOutcome, NewNotification, Notification, PageRequest, ReadOutcome,
};
use crate::store::NotificationStore;

#[derive(Clone)]
pub struct ReadStateReconciler {
    store: Arc<dyn NotificationStore>,
    counter: UnreadCounter,
    fanout: Arc<dyn FanoutNotifier>,
}

impl ReadStateReconciler {
    pub fn new(store: Arc<dyn NotificationStore>, fanout: Arc<dyn FanoutNotifier>) -> Self {
        Self {
            counter: UnreadCounter::new(store.clone()),
            store,
            fanout,
        }
    }

    pub fn counter(&self) -> &UnreadCounter {
        &self.counter
    }

    // ── Queries ──────────────────────────────────────────────

    pub async fn list(
        &self,
        ctx: &RequestContext,
        page: &PageRequest,
    ) -> Result<Vec<Notification>, AppError> {
        Ok(self.store.list_for_user(ctx.user_id, page).await?)
    }

    pub async fn unread_count(&self, ctx: &RequestContext) -> Result<i64, AppError> {
        Ok(self.counter.get_unread_count(ctx.user_id).await?)
    }

    // ── Read transitions ─────────────────────────────────────

    /// Unread -> Read for one notification. Returns whether anything changed;
    /// an already-read notification succeeds without a push.
    pub async fn mark_read(
        &self,
        ctx: &RequestContext,
        notification_id: Uuid,
    ) -> Result<bool, AppError> {
        match self.store.mark_read(notification_id, ctx.user_id).await? {
            ReadOutcome::NotFound => Err(AppError::NotFound),
            ReadOutcome::AlreadyRead => Ok(false),
            ReadOutcome::Marked => {
                metrics::record_read_transitions("single", 1);
                tracing::info!(
                    user_id = %ctx.user_id,
                    request_id = %ctx.request_id,
                    notification_id = %notification_id,
                    "notification marked read"
                );
                self.publish_count(ctx.user_id).await;
                Ok(true)
            }
        }
    }

    /// Marks every unread notification of (chat, caller). Idempotent: a
    /// second call marks nothing and pushes nothing.
    pub async fn mark_chat_read(&self, ctx: &RequestContext, chat_id: Uuid) -> Result<u64, AppError> {
        let marked = self.store.mark_chat_read(chat_id, ctx.user_id).await?;
        if marked > 0 {
            metrics::record_read_transitions("chat", marked);
            tracing::info!(
                user_id = %ctx.user_id,
                request_id = %ctx.request_id,
                chat_id = %chat_id,
                marked,
                "chat notifications marked read"
            );
            self.publish_count(ctx.user_id).await;
        }
        Ok(marked)
    }

    // ── Lifecycle ────────────────────────────────────────────

    pub async fn delete(&self, ctx: &RequestContext, notification_id: Uuid) -> Result<(), AppError> {
        match self.store.delete(notification_id, ctx.user_id).await? {
            DeleteOutcome::NotFound => Err(AppError::NotFound),
            DeleteOutcome::Deleted { was_unread } => {
                tracing::info!(
                    user_id = %ctx.user_id,
                    request_id = %ctx.request_id,
                    notification_id = %notification_id,
                    was_unread,
                    "notification deleted"
                );
                if was_unread {
                    self.publish_count(ctx.user_id).await;
                }
                Ok(())
            }
        }
    }

    pub async fn create(&self, new: NewNotification) -> Result<Notification, AppError> {
        new.validate()?;
        let notification = self.store.insert(new).await?;
        tracing::info!(
            user_id = %notification.user_id,
            chat_id = %notification.chat_id,
            notification_id = %notification.id,
            kind = %notification.kind,
            "notification created"
        );

        if let Err(e) = self.fanout.notify_created(&notification).await {
            metrics::record_fanout_failure("push");
            tracing::warn!(
                user_id = %notification.user_id,
                "fanout: ReceiveNotification push failed: {:#}",
                e
            );
        }
        self.publish_count(notification.user_id).await;
        Ok(notification)
    }

    /// Cascade for a deleted chat: drop its notifications for everyone and
    /// refresh the count of each user who lost unread ones.
    pub async fn delete_chat(&self, chat_id: Uuid) -> Result<ChatPurge, AppError> {
        let purge = self.store.delete_for_chat(chat_id).await?;
        tracing::info!(
            chat_id = %chat_id,
            removed = purge.removed,
            affected_users = purge.affected_users.len(),
            "chat notifications removed"
        );
        for user_id in &purge.affected_users {
            self.publish_count(*user_id).await;
        }
        Ok(purge)
    }

    // ── Fan-out ──────────────────────────────────────────────

    /// Recount and push. Best effort: failures are logged, never returned.
    async fn publish_count(&self, user_id: Uuid) {
        let count = match self.counter.get_unread_count(user_id).await {
            Ok(c) => c,
            Err(e) => {
                metrics::record_fanout_failure("recount");
                tracing::warn!(user_id = %user_id, "fanout: recount failed, push skipped: {:#}", e);
                return;
            }
        };

        match self.fanout.notify_unread_count_changed(user_id, count).await {
            Ok(reached) => {
                tracing::debug!(user_id = %user_id, count, reached, "fanout: UnreadCountChanged");
            }
            Err(e) => {
                metrics::record_fanout_failure("push");
                tracing::warn!(user_id = %user_id, count, "fanout: UnreadCountChanged push failed: {:#}", e);
            }
        }
    }
}
