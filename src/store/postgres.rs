use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::NotificationStore;
use crate::models::notification::{
    ChatPurge, DeleteOutcome, NewNotification, Notification, PageRequest, ReadOutcome,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chat_id: Uuid,
    pub message_id: Option<Uuid>,
    pub r#type: String, // 'type' is a reserved keyword
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = anyhow::Error;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            chat_id: row.chat_id,
            message_id: row.message_id,
            kind: row.r#type.parse()?,
            content: row.content,
            is_read: row.is_read,
            created_at: row.created_at,
            read_at: row.read_at,
        })
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, chat_id, message_id, type, content, is_read, created_at, read_at";

#[async_trait]
impl NotificationStore for PgStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {} FROM notifications WHERE id = $1",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Notification::try_from).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: &PageRequest,
    ) -> anyhow::Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"SELECT {}
               FROM notifications
               WHERE user_id = $1 AND ($2 = false OR is_read = false)
               ORDER BY created_at DESC, id DESC
               LIMIT $3 OFFSET $4"#,
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(page.unread_only)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn insert(&self, new: NewNotification) -> anyhow::Result<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"INSERT INTO notifications (id, user_id, chat_id, message_id, type, content)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {}"#,
            NOTIFICATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.chat_id)
        .bind(new.message_id)
        .bind(new.kind.as_str())
        .bind(&new.content)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn unread_count(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<ReadOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock so a concurrent delete or mark cannot interleave.
        let current = sqlx::query_scalar::<_, bool>(
            "SELECT is_read FROM notifications WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match current {
            None => ReadOutcome::NotFound,
            Some(true) => ReadOutcome::AlreadyRead,
            Some(false) => {
                sqlx::query(
                    "UPDATE notifications SET is_read = true, read_at = NOW() WHERE id = $1",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;
                ReadOutcome::Marked
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn mark_chat_read(&self, chat_id: Uuid, user_id: Uuid) -> anyhow::Result<u64> {
        // One statement: under READ COMMITTED a concurrent caller blocks on the
        // row locks and re-checks `is_read`, so every row is counted once.
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"UPDATE notifications
               SET is_read = true, read_at = NOW()
               WHERE chat_id = $1 AND user_id = $2 AND is_read = false"#,
        )
        .bind(chat_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<DeleteOutcome> {
        let was_read = sqlx::query_scalar::<_, bool>(
            "DELETE FROM notifications WHERE id = $1 AND user_id = $2 RETURNING is_read",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match was_read {
            Some(is_read) => DeleteOutcome::Deleted {
                was_unread: !is_read,
            },
            None => DeleteOutcome::NotFound,
        })
    }

    async fn delete_for_chat(&self, chat_id: Uuid) -> anyhow::Result<ChatPurge> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, (Uuid, bool)>(
            "DELETE FROM notifications WHERE chat_id = $1 RETURNING user_id, is_read",
        )
        .bind(chat_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut affected_users: Vec<Uuid> = rows
            .iter()
            .filter(|(_, is_read)| !is_read)
            .map(|(user_id, _)| *user_id)
            .collect();
        affected_users.sort();
        affected_users.dedup();

        Ok(ChatPurge {
            removed: rows.len() as u64,
            affected_users,
        })
    }

    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE is_read = true AND read_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
