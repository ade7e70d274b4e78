use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::notification::Notification;

// ── Push Event Types ─────────────────────────────────────────

/// An event pushed to a user's live connections.
/// Serialized as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum HubEvent {
    #[serde(rename_all = "camelCase")]
    UnreadCountChanged { user_id: Uuid, unread_count: i64 },

    ReceiveNotification(Notification),

    /// Relayed between a user's own sessions to sync read markers.
    #[serde(rename_all = "camelCase")]
    MessageRead { chat_id: Uuid, message_id: Uuid },
}

impl HubEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HubEvent::UnreadCountChanged { .. } => "UnreadCountChanged",
            HubEvent::ReceiveNotification(_) => "ReceiveNotification",
            HubEvent::MessageRead { .. } => "MessageRead",
        }
    }
}

// ── Fan-out Notifier ─────────────────────────────────────────

/// Delivers events to whichever live connections belong to a user.
///
/// Delivery is at-most-once with no retry. A user with no open connection
/// is not an error: `publish` returns `Ok(0)`.
#[async_trait]
pub trait FanoutNotifier: Send + Sync {
    /// Returns how many connections accepted the event.
    async fn publish(&self, user_id: Uuid, event: HubEvent) -> anyhow::Result<usize>;

    async fn notify_unread_count_changed(&self, user_id: Uuid, count: i64) -> anyhow::Result<usize> {
        self.publish(
            user_id,
            HubEvent::UnreadCountChanged {
                user_id,
                unread_count: count,
            },
        )
        .await
    }

    async fn notify_created(&self, notification: &Notification) -> anyhow::Result<usize> {
        self.publish(
            notification.user_id,
            HubEvent::ReceiveNotification(notification.clone()),
        )
        .await
    }
}
