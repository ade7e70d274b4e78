use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::middleware::auth::admin_auth;
use crate::middleware::request_id::request_id_middleware;
use crate::AppState;

pub mod handlers;
pub mod ws;

/// The whole HTTP surface: health, metrics, user API, internal API.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints (no auth)
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .nest("/api", api_router())
        .nest("/internal", internal_router(state.clone()))
        .fallback(fallback_404)
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
}

/// User-facing routes. Each handler authenticates through `RequestContext`.
/// Relative paths; the caller mounts this under `/api`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/unread-count",
            get(handlers::get_unread_count),
        )
        .route("/notifications/hub", get(ws::hub_handler))
        .route(
            "/notifications/:id",
            delete(handlers::delete_notification),
        )
        .route("/notifications/:id/read", put(handlers::mark_read))
        .route(
            "/notifications/chat/:chat_id/read",
            put(handlers::mark_chat_read),
        )
}

/// Service-to-service routes used by the messaging backend.
pub fn internal_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", post(handlers::create_notification))
        .route(
            "/chats/:chat_id/notifications",
            delete(handlers::delete_chat_notifications),
        )
        .layer(middleware::from_fn_with_state(state, admin_auth))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
