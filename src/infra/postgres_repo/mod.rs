//! Postgres-backed implementation of the `Repo` port.
mod connection;
mod errors;
mod feeds;
mod items;
mod migrations;
mod models;

pub use connection::create_pool;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::error::NewErrorRecord;
use crate::domain::model::{FeedConfig, FeedDraft, NewItem, PersistedItem};
use crate::ports::repo::Repo;

#[derive(Clone)]
pub struct PostgresRepo {
    pool: PgPool,
}

impl PostgresRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), String> {
        migrations::migrate(&self.pool).await
    }
}

#[async_trait::async_trait]
impl Repo for PostgresRepo {
    async fn get_all_feeds(&self) -> Result<Vec<FeedConfig>, String> {
        feeds::get_all(&self.pool).await
    }

    async fn get_feed_by_url(&self, url: &str) -> Result<Option<FeedConfig>, String> {
        feeds::get_by_url(&self.pool, url).await
    }

    async fn insert_feed(&self, draft: &FeedDraft) -> Result<FeedConfig, String> {
        feeds::insert(&self.pool, draft).await
    }

    async fn update_feed(&self, config: &FeedConfig) -> Result<(), String> {
        feeds::update(&self.pool, config).await
    }

    async fn remove_feed_by_url(&self, url: &str) -> Result<u64, String> {
        feeds::remove_by_url(&self.pool, url).await
    }

    async fn bulk_upsert_items(&self, rows: &[NewItem]) -> Result<(), String> {
        items::bulk_upsert(&self.pool, rows).await
    }

    async fn find_inserted_since(
        &self,
        website: i32,
        urls: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, String> {
        items::find_inserted_since(&self.pool, website, urls, since).await
    }

    async fn get_item(&self, website: i32, url: &str) -> Result<Option<PersistedItem>, String> {
        items::get(&self.pool, website, url).await
    }

    async fn log_error(&self, record: &NewErrorRecord) {
        errors::log(&self.pool, record).await
    }
}
