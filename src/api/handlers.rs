use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::auth::RequestContext;
use crate::middleware::metrics::encode_metrics;
use crate::models::notification::{NewNotification, Notification, PageRequest};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub unread_only: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkChatReadResponse {
    pub success: bool,
    pub marked_count: u64,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPurgeResponse {
    pub success: bool,
    pub removed: u64,
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("malformed {} id", what)))
}

// ── Health / Metrics ─────────────────────────────────────────

pub async fn readiness_check(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.store.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!("readiness: store unreachable: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

// ── Notification Handlers ────────────────────────────────────

/// GET /api/notifications: page through the caller's notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let Query(params) = params.map_err(|e| AppError::Validation(e.body_text()))?;
    let page = PageRequest::new(
        params.page.unwrap_or(1),
        params
            .page_size
            .unwrap_or(state.config.default_page_size as i64),
        params.unread_only.unwrap_or(true),
        state.config.max_page_size,
    )?;

    let notifications = state.reconciler.list(&ctx, &page).await?;
    Ok(Json(notifications))
}

/// GET /api/notifications/unread-count
pub async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread_count = state.reconciler.unread_count(&ctx).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

/// PUT /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id_str): Path<String>,
) -> Result<Json<CommandResponse>, AppError> {
    let id = parse_id(&id_str, "notification")?;
    state.reconciler.mark_read(&ctx, id).await?;
    Ok(Json(CommandResponse {
        success: true,
        message: "Notification marked as read".into(),
    }))
}

/// PUT /api/notifications/chat/:chat_id/read
pub async fn mark_chat_read(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(chat_id_str): Path<String>,
) -> Result<Json<MarkChatReadResponse>, AppError> {
    let chat_id = parse_id(&chat_id_str, "chat")?;
    let marked_count = state.reconciler.mark_chat_read(&ctx, chat_id).await?;
    Ok(Json(MarkChatReadResponse {
        success: true,
        marked_count,
        message: format!("Marked {} notifications as read", marked_count),
    }))
}

/// DELETE /api/notifications/:id
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id_str): Path<String>,
) -> Result<Json<CommandResponse>, AppError> {
    let id = parse_id(&id_str, "notification")?;
    state.reconciler.delete(&ctx, id).await?;
    Ok(Json(CommandResponse {
        success: true,
        message: "Notification deleted".into(),
    }))
}

// ── Internal Handlers ────────────────────────────────────────

/// POST /internal/notifications, called by the messaging backend
pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewNotification>, JsonRejection>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let Json(new) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let notification = state.reconciler.create(new).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// DELETE /internal/chats/:chat_id/notifications (chat deletion cascade)
pub async fn delete_chat_notifications(
    State(state): State<Arc<AppState>>,
    Path(chat_id_str): Path<String>,
) -> Result<Json<ChatPurgeResponse>, AppError> {
    let chat_id = parse_id(&chat_id_str, "chat")?;
    let purge = state.reconciler.delete_chat(chat_id).await?;
    Ok(Json(ChatPurgeResponse {
        success: true,
        removed: purge.removed,
    }))
}
