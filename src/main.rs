use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use inbox::cli::{self, NotificationCommands};
use inbox::config::{self, Config, StorageKind};
use inbox::jobs;
use inbox::middleware::auth::issue_user_token;
use inbox::models::notification::{NewNotification, PageRequest};
use inbox::store::memory::MemoryStore;
use inbox::store::postgres::PgStore;
use inbox::store::NotificationStore;
use inbox::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OTLP export is enabled only when OTEL_EXPORTER_OTLP_ENDPOINT is set.
    use opentelemetry::KeyValue;

    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "inbox"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "inbox=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port, storage }) => run_server(cfg, port, storage).await,
        Some(cli::Commands::Migrate) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            db.migrate().await?;
            println!("Migrations applied.");
            Ok(())
        }
        Some(cli::Commands::Notification { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            handle_notification_command(&db, &cfg, command).await
        }
        Some(cli::Commands::Token {
            user_id,
            ttl_minutes,
        }) => handle_token_command(&cfg, &user_id, ttl_minutes),
        None => run_server(cfg, None, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn open_store(cfg: &Config, kind: StorageKind) -> anyhow::Result<Arc<dyn NotificationStore>> {
    match kind {
        StorageKind::Postgres => {
            tracing::info!("Connecting to database...");
            let db = PgStore::connect(&cfg.database_url).await?;

            tracing::info!("Running migrations...");
            db.migrate().await?;
            Ok(Arc::new(db))
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage; notifications are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn run_server(
    mut cfg: Config,
    port: Option<u16>,
    storage: Option<StorageKind>,
) -> anyhow::Result<()> {
    if let Some(p) = port {
        cfg.port = p;
    }
    if let Some(s) = storage {
        cfg.storage = s;
    }

    let store = open_store(&cfg, cfg.storage).await?;

    if cfg.admin_key.is_none() {
        tracing::warn!("INBOX_ADMIN_KEY is not set; internal routes will refuse all calls");
    }

    jobs::retention::spawn(
        store.clone(),
        cfg.read_retention_days,
        Duration::from_secs(cfg.purge_interval_secs),
    );

    let port = cfg.port;
    let client_origin = cfg.client_origin.clone();
    let state = Arc::new(AppState::new(store, cfg));

    let app = api::app(state)
        // Notification payloads are small; 1 MB is generous
        .layer(DefaultBodyLimit::max(1024 * 1024))
        // Upgraded WebSocket sessions run outside the request future and are not cut off
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(30)))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer({
            use axum::http::{HeaderName, Method};
            use tower_http::cors::AllowOrigin;
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == client_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::PUT, Method::DELETE, Method::OPTIONS])
                // NOTE: AllowHeaders::any() is rejected together with allow_credentials(true)
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                    HeaderName::from_static("x-request-id"),
                ])
                .allow_credentials(true)
        })
        .layer(axum::middleware::from_fn(security_headers_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Inbox listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    // Unread counts and notification bodies are per-user
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.remove("Server");

    resp
}

async fn handle_notification_command(
    db: &PgStore,
    cfg: &Config,
    cmd: NotificationCommands,
) -> anyhow::Result<()> {
    match cmd {
        NotificationCommands::Create {
            user_id,
            chat_id,
            message_id,
            kind,
            content,
        } => {
            let message_id = message_id
                .map(|m| Uuid::parse_str(&m).context("Invalid message_id"))
                .transpose()?;
            let new = NewNotification {
                user_id: Uuid::parse_str(&user_id).context("Invalid user_id")?,
                chat_id: Uuid::parse_str(&chat_id).context("Invalid chat_id")?,
                message_id,
                kind: kind.parse()?,
                content,
            };
            new.validate()?;
            let n = db.insert(new).await?;
            println!(
                "Notification created:\n  ID:       {}\n  User:     {}\n  Chat:     {}\n  Type:     {}",
                n.id, n.user_id, n.chat_id, n.kind
            );
            println!("(Live sessions are not notified from the CLI; use the internal API for that.)");
        }
        NotificationCommands::List {
            user_id,
            page,
            page_size,
            all,
        } => {
            let uid = Uuid::parse_str(&user_id).context("Invalid user_id")?;
            let page = PageRequest::new(page, page_size, !all, cfg.max_page_size)?;
            let rows = db.list_for_user(uid, &page).await?;
            if rows.is_empty() {
                println!("No notifications found.");
            } else {
                println!(
                    "{:<38} {:<16} {:<6} {:<26} {}",
                    "ID", "TYPE", "READ", "CREATED", "CONTENT"
                );
                for n in rows {
                    println!(
                        "{:<38} {:<16} {:<6} {:<26} {}",
                        n.id,
                        n.kind,
                        n.is_read,
                        n.created_at.to_rfc3339(),
                        n.content
                    );
                }
            }
        }
        NotificationCommands::Unread { user_id } => {
            let uid = Uuid::parse_str(&user_id).context("Invalid user_id")?;
            let count = db.unread_count(uid).await?;
            println!("{}", count);
        }
        NotificationCommands::Purge { days } => {
            let days = days.unwrap_or(cfg.read_retention_days);
            if days == 0 {
                anyhow::bail!("Retention is disabled (0 days); pass --days to purge explicitly");
            }
            let removed = jobs::retention::purge_once(db, days).await?;
            println!("Purged {} read notifications older than {} days.", removed, days);
        }
    }
    Ok(())
}

fn handle_token_command(cfg: &Config, user_id: &str, ttl_minutes: i64) -> anyhow::Result<()> {
    let uid = Uuid::parse_str(user_id).context("Invalid user_id")?;
    if ttl_minutes <= 0 {
        anyhow::bail!("ttl_minutes must be positive");
    }
    let token = issue_user_token(uid, &cfg.jwt_secret, chrono::Duration::minutes(ttl_minutes))?;
    println!("{}", token);
    Ok(())
}
