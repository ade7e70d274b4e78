//! Background job: purge read notifications past the retention window.
//!
//! Only rows with `is_read = true` are removed, so no user's unread count
//! changes and nothing needs to be pushed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;

use crate::store::NotificationStore;

/// Spawn the background purge task. Call this once at startup.
/// A retention of 0 days disables the job.
pub fn spawn(store: Arc<dyn NotificationStore>, retention_days: u32, every: Duration) {
    if retention_days == 0 {
        tracing::info!("retention job disabled (INBOX_READ_RETENTION_DAYS=0)");
        return;
    }

    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = purge_once(store.as_ref(), retention_days).await {
                tracing::error!("retention job failed: {}", e);
            }
        }
    });
}

/// Delete read notifications whose `read_at` is older than `retention_days`.
pub async fn purge_once(store: &dyn NotificationStore, retention_days: u32) -> anyhow::Result<u64> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
    let removed = store.purge_read_before(cutoff).await?;

    if removed > 0 {
        tracing::info!(
            rows = removed,
            retention_days,
            "purged read notifications past retention"
        );
    }
    Ok(removed)
}
