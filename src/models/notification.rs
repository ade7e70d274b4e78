use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// What triggered a notification. Stored as snake_case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DirectMessage,
    GroupMessage,
    Mention,
    Reaction,
    Invitation,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::DirectMessage => "direct_message",
            NotificationType::GroupMessage => "group_message",
            NotificationType::Mention => "mention",
            NotificationType::Reaction => "reaction",
            NotificationType::Invitation => "invitation",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct_message" => Ok(NotificationType::DirectMessage),
            "group_message" => Ok(NotificationType::GroupMessage),
            "mention" => Ok(NotificationType::Mention),
            "reaction" => Ok(NotificationType::Reaction),
            "invitation" => Ok(NotificationType::Invitation),
            other => anyhow::bail!("unknown notification type '{}'", other),
        }
    }
}

/// A persisted notification. Only `is_read` / `read_at` ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chat_id: Uuid,
    pub message_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Input for creating a notification (sent by the messaging side).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: Uuid,
    pub chat_id: Uuid,
    #[serde(default)]
    pub message_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub content: String,
}

impl NewNotification {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.content.trim().is_empty() {
            return Err(AppError::Validation(
                "notification content must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Materialize into a fresh unread notification.
    pub fn into_notification(self, now: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            chat_id: self.chat_id,
            message_id: self.message_id,
            kind: self.kind,
            content: self.content,
            is_read: false,
            created_at: now,
            read_at: None,
        }
    }
}

/// A validated, 1-based page of a user's notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub unread_only: bool,
}

impl PageRequest {
    /// Rejects page/page_size below 1; clamps page_size to `max_page_size`.
    pub fn new(
        page: i64,
        page_size: i64,
        unread_only: bool,
        max_page_size: u32,
    ) -> Result<Self, AppError> {
        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".into()));
        }
        if page_size < 1 {
            return Err(AppError::Validation("pageSize must be at least 1".into()));
        }
        let page = u32::try_from(page)
            .map_err(|_| AppError::Validation("page is out of range".into()))?;
        let page_size = page_size.min(max_page_size as i64) as u32;
        Ok(Self {
            page,
            page_size,
            unread_only,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

/// Result of a single-notification read transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Marked,
    AlreadyRead,
    NotFound,
}

/// Result of an owner-scoped delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted { was_unread: bool },
    NotFound,
}

/// Result of removing every notification attached to a chat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatPurge {
    pub removed: u64,
    /// Users that lost at least one unread notification.
    pub affected_users: Vec<Uuid>,
}
