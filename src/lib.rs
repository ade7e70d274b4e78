//! Inbox: notification read-state service.
//!
//! Keeps each user's unread notification count consistent with mark-read,
//! mark-chat-read and delete operations, and pushes the new count to the
//! user's live connections.

use std::sync::Arc;

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod notification;
pub mod store;

use notification::{ConnectionHub, FanoutNotifier, ReadStateReconciler};
use store::NotificationStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub store: Arc<dyn NotificationStore>,
    pub hub: Arc<ConnectionHub>,
    pub reconciler: ReadStateReconciler,
    pub config: config::Config,
}

impl AppState {
    /// Wires the reconciler to push through the in-process hub.
    pub fn new(store: Arc<dyn NotificationStore>, config: config::Config) -> Self {
        let hub = Arc::new(ConnectionHub::new(config.hub_buffer));
        let fanout: Arc<dyn FanoutNotifier> = hub.clone();
        let reconciler = ReadStateReconciler::new(store.clone(), fanout);
        Self {
            store,
            hub,
            reconciler,
            config,
        }
    }
}
