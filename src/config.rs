use std::str::FromStr;

use serde::Deserialize;

const PLACEHOLDER_SECRET: &str = "CHANGE_ME_JWT_SECRET";

/// Which `NotificationStore` backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Postgres,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StorageKind::Postgres),
            "memory" | "mem" => Ok(StorageKind::Memory),
            other => anyhow::bail!("unknown storage backend '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub storage: StorageKind,
    /// HS256 secret used to validate user bearer tokens.
    pub jwt_secret: String,
    /// Key for the internal routes. Internal routes reject everything when unset.
    pub admin_key: Option<String>,
    /// Origin of the web client, allowed by CORS.
    pub client_origin: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Per-connection push queue length. A full queue drops the event.
    pub hub_buffer: usize,
    /// Read notifications older than this are purged. 0 = keep forever.
    /// Set via INBOX_READ_RETENTION_DAYS. Default: 30.
    pub read_retention_days: u32,
    pub purge_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: "postgres://localhost/inbox".into(),
            storage: StorageKind::Postgres,
            jwt_secret: PLACEHOLDER_SECRET.into(),
            admin_key: None,
            client_origin: "http://localhost:3000".into(),
            default_page_size: 20,
            max_page_size: 100,
            hub_buffer: 64,
            read_retention_days: 30,
            purge_interval_secs: 3600,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let defaults = Config::default();

    let jwt_secret =
        std::env::var("INBOX_JWT_SECRET").unwrap_or_else(|_| PLACEHOLDER_SECRET.into());

    if jwt_secret == PLACEHOLDER_SECRET {
        let env_mode = std::env::var("INBOX_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "INBOX_JWT_SECRET is still the insecure placeholder. \
                 Set the secret shared with the auth service before running in production."
            );
        }
        eprintln!("⚠️  INBOX_JWT_SECRET is not set; using insecure placeholder.");
    }

    let storage = match std::env::var("INBOX_STORAGE") {
        Ok(v) => v.parse()?,
        Err(_) => defaults.storage,
    };

    let default_page_size = env_or("INBOX_DEFAULT_PAGE_SIZE", defaults.default_page_size).max(1);
    let max_page_size = env_or("INBOX_MAX_PAGE_SIZE", defaults.max_page_size).max(default_page_size);

    Ok(Config {
        port: env_or("INBOX_PORT", defaults.port),
        database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
        storage,
        jwt_secret,
        admin_key: std::env::var("INBOX_ADMIN_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty()),
        client_origin: std::env::var("INBOX_CLIENT_ORIGIN").unwrap_or(defaults.client_origin),
        default_page_size,
        max_page_size,
        hub_buffer: env_or("INBOX_HUB_BUFFER", defaults.hub_buffer).max(1),
        read_retention_days: env_or("INBOX_READ_RETENTION_DAYS", defaults.read_retention_days),
        purge_interval_secs: env_or("INBOX_PURGE_INTERVAL_SECS", defaults.purge_interval_secs)
            .max(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = Config::default();
        assert!(cfg.default_page_size <= cfg.max_page_size);
        assert!(cfg.hub_buffer > 0);
        assert!(cfg.admin_key.is_none());
    }

    #[test]
    fn test_storage_kind_parsing() {
        assert_eq!("memory".parse::<StorageKind>().unwrap(), StorageKind::Memory);
        assert_eq!("PG".parse::<StorageKind>().unwrap(), StorageKind::Postgres);
        assert!("sqlite".parse::<StorageKind>().is_err());
    }
}
