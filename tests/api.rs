//! HTTP surface tests.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`
//! over the in-memory store, so no listener or database is started.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use inbox::config::Config;
use inbox::middleware::auth::issue_user_token;
use inbox::models::notification::{NewNotification, NotificationType};
use inbox::store::memory::MemoryStore;
use inbox::store::NotificationStore;
use inbox::AppState;

const SECRET: &str = "api-test-secret";
const ADMIN_KEY: &str = "internal-admin-key";

struct TestApp {
    router: Router,
    store: MemoryStore,
}

impl TestApp {
    fn new() -> Self {
        let store = MemoryStore::new();
        let config = Config {
            jwt_secret: SECRET.into(),
            admin_key: Some(ADMIN_KEY.into()),
            default_page_size: 20,
            max_page_size: 50,
            ..Config::default()
        };
        let state = Arc::new(AppState::new(Arc::new(store.clone()), config));
        Self {
            router: inbox::api::app(state),
            store,
        }
    }

    async fn seed(&self, user_id: Uuid, chat_id: Uuid, n: usize) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for i in 0..n {
            let row = self
                .store
                .insert(NewNotification {
                    user_id,
                    chat_id,
                    message_id: None,
                    kind: NotificationType::GroupMessage,
                    content: format!("message {}", i),
                })
                .await
                .unwrap();
            ids.push(row.id);
        }
        ids
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

fn bearer(user_id: Uuid) -> String {
    let token = issue_user_token(user_id, SECRET, chrono::Duration::minutes(5)).unwrap();
    format!("Bearer {}", token)
}

fn user_request(method: Method, uri: &str, user_id: Uuid) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, bearer(user_id))
        .body(Body::empty())
        .unwrap()
}

fn internal_request(method: Method, uri: &str, key: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(k) = key {
        builder = builder.header("x-admin-key", k);
    }
    let body = body.map(|v| Body::from(v.to_string())).unwrap_or_else(Body::empty);
    builder.body(body).unwrap()
}

// ── Authentication ───────────────────────────────────────────

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();
    let req = Request::builder()
        .uri("/api/notifications/unread-count")
        .body(Body::empty())
        .unwrap();

    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_unauthorized() {
    let app = TestApp::new();
    let token =
        issue_user_token(Uuid::new_v4(), "someone-else", chrono::Duration::minutes(5)).unwrap();
    let req = Request::builder()
        .uri("/api/notifications")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Queries ──────────────────────────────────────────────────

#[tokio::test]
async fn test_unread_count_shape() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.seed(user, Uuid::new_v4(), 2).await;

    let (status, body) = app
        .send(user_request(Method::GET, "/api/notifications/unread-count", user))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "unreadCount": 2 }));
}

#[tokio::test]
async fn test_list_pages_and_filters_unread() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let ids = app.seed(user, Uuid::new_v4(), 5).await;
    app.store.mark_read(ids[0], user).await.unwrap();

    let (status, body) = app
        .send(user_request(
            Method::GET,
            "/api/notifications?page=1&pageSize=3",
            user,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r["isRead"] == json!(false)));
    assert_eq!(rows[0]["type"], json!("group_message"));

    let (_, body) = app
        .send(user_request(
            Method::GET,
            "/api/notifications?page=1&pageSize=10&unreadOnly=false",
            user,
        ))
        .await;
    assert_eq!(body.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_list_rejects_zero_page_size() {
    let app = TestApp::new();
    let (status, body) = app
        .send(user_request(
            Method::GET,
            "/api/notifications?pageSize=0",
            Uuid::new_v4(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

// ── Commands ─────────────────────────────────────────────────

#[tokio::test]
async fn test_mark_read_unknown_id_is_404() {
    let app = TestApp::new();
    let uri = format!("/api/notifications/{}/read", Uuid::new_v4());

    let (status, body) = app
        .send(user_request(Method::PUT, &uri, Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({ "success": false, "errorMessage": "Notification not found" })
    );
}

#[tokio::test]
async fn test_mark_read_malformed_id_is_400() {
    let app = TestApp::new();
    let (status, body) = app
        .send(user_request(
            Method::PUT,
            "/api/notifications/not-a-uuid/read",
            Uuid::new_v4(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorMessage"], json!("malformed notification id"));
}

#[tokio::test]
async fn test_mark_read_then_count_drops() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let ids = app.seed(user, Uuid::new_v4(), 2).await;

    let uri = format!("/api/notifications/{}/read", ids[1]);
    let (status, body) = app.send(user_request(Method::PUT, &uri, user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    // Marking again is still a success.
    let (status, _) = app.send(user_request(Method::PUT, &uri, user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.unread_count(user).await.unwrap(), 1);
}

#[tokio::test]
async fn test_mark_chat_read_reports_marked_count() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let chat = Uuid::new_v4();
    app.seed(user, chat, 3).await;
    app.seed(user, Uuid::new_v4(), 1).await;
    let uri = format!("/api/notifications/chat/{}/read", chat);

    let (status, body) = app.send(user_request(Method::PUT, &uri, user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["markedCount"], json!(3));
    assert_eq!(body["message"], json!("Marked 3 notifications as read"));

    let (_, body) = app.send(user_request(Method::PUT, &uri, user)).await;
    assert_eq!(body["markedCount"], json!(0));
    assert_eq!(app.store.unread_count(user).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_someone_elses_notification_is_404() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let ids = app.seed(owner, Uuid::new_v4(), 1).await;
    let uri = format!("/api/notifications/{}", ids[0]);

    let (status, body) = app
        .send(user_request(Method::DELETE, &uri, Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorMessage"], json!("Notification not found"));
    assert_eq!(app.store.len().await, 1);

    let (status, _) = app.send(user_request(Method::DELETE, &uri, owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.store.is_empty().await);
}

// ── Internal API ─────────────────────────────────────────────

#[tokio::test]
async fn test_internal_create_requires_admin_key() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let payload = json!({
        "userId": user,
        "chatId": Uuid::new_v4(),
        "type": "mention",
        "content": "@you"
    });

    let (status, _) = app
        .send(internal_request(
            Method::POST,
            "/internal/notifications",
            None,
            Some(payload.clone()),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(internal_request(
            Method::POST,
            "/internal/notifications",
            Some("wrong-key-entirely"),
            Some(payload.clone()),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.store.is_empty().await);

    let (status, body) = app
        .send(internal_request(
            Method::POST,
            "/internal/notifications",
            Some(ADMIN_KEY),
            Some(payload),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["type"], json!("mention"));
    assert_eq!(body["isRead"], json!(false));
    assert_eq!(app.store.unread_count(user).await.unwrap(), 1);
}

#[tokio::test]
async fn test_internal_chat_cascade() {
    let app = TestApp::new();
    let chat = Uuid::new_v4();
    app.seed(Uuid::new_v4(), chat, 2).await;
    app.seed(Uuid::new_v4(), chat, 1).await;
    app.seed(Uuid::new_v4(), Uuid::new_v4(), 1).await;

    let uri = format!("/internal/chats/{}/notifications", chat);
    let (status, body) = app
        .send(internal_request(Method::DELETE, &uri, Some(ADMIN_KEY), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "removed": 3 }));
    assert_eq!(app.store.len().await, 1);
}

// ── Health ───────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_metrics_are_public() {
    let app = TestApp::new();

    for path in ["/healthz", "/readyz", "/metrics"] {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{}", path);
    }
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let req = Request::builder()
        .uri("/healthz")
        .header("x-request-id", "trace-me-123")
        .body(Body::empty())
        .unwrap();

    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers().get("x-request-id").unwrap(),
        "trace-me-123"
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new();
    let req = Request::builder()
        .uri("/api/nothing-here")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
