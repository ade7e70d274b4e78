//! ConnectionHub: in-process registry of live connections per user.
//!
//! Each WebSocket session subscribes once and gets a bounded queue. Pushes
//! use `try_send`, so a slow client never blocks the request that produced
//! the event: a full queue drops the event for that session only. Sessions
//! whose receiver is gone are pruned on the next delivery.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::fanout::{FanoutNotifier, HubEvent};
use crate::middleware::metrics;

struct Session {
    id: u64,
    tx: mpsc::Sender<HubEvent>,
}

/// The receiving half handed to a live connection.
pub struct Subscription {
    pub user_id: Uuid,
    pub connection_id: u64,
    pub events: mpsc::Receiver<HubEvent>,
}

/// Outcome of one delivery across a user's sessions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct ConnectionHub {
    sessions: DashMap<Uuid, Vec<Session>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl ConnectionHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    pub fn subscribe(&self, user_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions
            .entry(user_id)
            .or_default()
            .push(Session { id, tx });
        metrics::connection_opened();
        tracing::debug!(user_id = %user_id, connection_id = id, "hub: session registered");

        Subscription {
            user_id,
            connection_id: id,
            events: rx,
        }
    }

    pub fn unsubscribe(&self, user_id: Uuid, connection_id: u64) {
        let mut removed = false;
        if let Some(mut list) = self.sessions.get_mut(&user_id) {
            let before = list.len();
            list.retain(|s| s.id != connection_id);
            removed = list.len() < before;
        }
        self.sessions.remove_if(&user_id, |_, list| list.is_empty());

        if removed {
            metrics::connection_closed();
            tracing::debug!(user_id = %user_id, connection_id, "hub: session removed");
        }
    }

    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.sessions.get(&user_id).map(|l| l.len()).unwrap_or(0)
    }

    pub fn total_connections(&self) -> usize {
        self.sessions.iter().map(|e| e.value().len()).sum()
    }

    /// Push to every session of `user_id`.
    pub fn deliver(&self, user_id: Uuid, event: &HubEvent) -> Delivery {
        self.deliver_filtered(user_id, event, None)
    }

    /// Push to every session of `user_id` except `skip_connection`.
    pub fn deliver_except(
        &self,
        user_id: Uuid,
        skip_connection: u64,
        event: &HubEvent,
    ) -> Delivery {
        self.deliver_filtered(user_id, event, Some(skip_connection))
    }

    fn deliver_filtered(&self, user_id: Uuid, event: &HubEvent, skip: Option<u64>) -> Delivery {
        let mut delivery = Delivery::default();
        let mut pruned = 0;

        if let Some(mut list) = self.sessions.get_mut(&user_id) {
            list.retain(|session| {
                if Some(session.id) == skip {
                    return true;
                }
                match session.tx.try_send(event.clone()) {
                    Ok(()) => {
                        delivery.delivered += 1;
                        true
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        delivery.dropped += 1;
                        tracing::warn!(
                            user_id = %user_id,
                            connection_id = session.id,
                            event = event.name(),
                            "hub: session queue full, event dropped"
                        );
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        pruned += 1;
                        false
                    }
                }
            });
        }

        if pruned > 0 {
            self.sessions.remove_if(&user_id, |_, list| list.is_empty());
            for _ in 0..pruned {
                metrics::connection_closed();
            }
        }

        let name = event.name();
        if delivery.delivered > 0 {
            metrics::record_push(name, "delivered");
        }
        if delivery.dropped > 0 {
            metrics::record_push(name, "dropped");
        }
        if delivery.delivered == 0 && delivery.dropped == 0 {
            metrics::record_push(name, "offline");
        }

        delivery
    }
}

#[async_trait]
impl FanoutNotifier for ConnectionHub {
    async fn publish(&self, user_id: Uuid, event: HubEvent) -> anyhow::Result<usize> {
        Ok(self.deliver(user_id, &event).delivered)
    }
}
