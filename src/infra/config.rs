//! Loads the TOML configuration and normalizes it into `WorkerConfig`.
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tokio::fs;

use crate::domain::model::FeedDraft;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub const DEFAULT_USER_AGENT: &str = "feedwire/0.1 (+https://github.com/feedwire/feedwire)";

#[derive(Debug, Deserialize)]
struct RawFile {
    database: RawDatabase,
    #[serde(default)]
    requests: RawRequests,
    #[serde(default)]
    logging: RawLogging,
    #[serde(default)]
    feeds: Vec<FeedDraft>,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    #[serde(default = "default_pg_user")]
    user: String,
    #[serde(default = "default_pg_password")]
    password: String,
    #[serde(default = "default_pg_host")]
    host: String,
    #[serde(default = "default_pg_port")]
    port: u16,
    #[serde(default = "default_pg_database")]
    db: String,
}

#[derive(Debug, Deserialize)]
struct RawRequests {
    #[serde(default = "default_user_agent")]
    user_agent: String,
    #[serde(default = "default_fetch_timeout")]
    fetch_timeout_seconds: u64,
}

impl Default for RawRequests {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            fetch_timeout_seconds: default_fetch_timeout(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawLogging {
    level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub postgres: PostgresConfig,
    pub user_agent: String,
    pub fetch_timeout_seconds: u64,
    pub log_level: String,
    pub seeds: Vec<FeedDraft>,
}

impl WorkerConfig {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).await?;
        let raw: RawFile = toml::from_str(&content)?;

        if raw.requests.fetch_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "requests.fetch_timeout_seconds must be at least 1".into(),
            ));
        }
        let user_agent = raw.requests.user_agent.trim().to_string();
        if user_agent.is_empty() {
            return Err(ConfigError::Invalid(
                "requests.user_agent cannot be blank".into(),
            ));
        }

        Ok(Self {
            postgres: PostgresConfig {
                user: raw.database.user,
                password: raw.database.password,
                host: raw.database.host,
                port: raw.database.port,
                database: raw.database.db,
            },
            user_agent,
            fetch_timeout_seconds: raw.requests.fetch_timeout_seconds,
            log_level: raw.logging.level.unwrap_or_else(|| "info".to_string()),
            seeds: raw.feeds,
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    /// Smallest refresh interval `add` accepts; the fetch timeout must stay
    /// strictly below every applied refresh.
    pub fn min_refresh_ms(&self) -> i64 {
        self.fetch_timeout_seconds.saturating_mul(1000) as i64
    }
}

fn default_pg_user() -> String {
    "admin".to_string()
}

fn default_pg_password() -> String {
    "admin".to_string()
}

fn default_pg_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pg_database() -> String {
    "feedwire".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_fetch_timeout() -> u64 {
    10
}
