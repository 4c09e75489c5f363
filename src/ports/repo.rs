//! Contract over the relational store: feed configs, item history, error log.
use chrono::{DateTime, Utc};

use crate::domain::error::NewErrorRecord;
use crate::domain::model::{FeedConfig, FeedDraft, NewItem, PersistedItem};

#[async_trait::async_trait]
pub trait Repo: Send + Sync {
    async fn get_all_feeds(&self) -> Result<Vec<FeedConfig>, String>;
    async fn get_feed_by_url(&self, url: &str) -> Result<Option<FeedConfig>, String>;

    /// Inserts a new config; the store assigns `id` and `created_at`.
    async fn insert_feed(&self, draft: &FeedDraft) -> Result<FeedConfig, String>;

    /// Updates the row matching `config.url` in place, preserving its id.
    async fn update_feed(&self, config: &FeedConfig) -> Result<(), String>;

    /// Returns the number of rows deleted; an unknown url deletes zero rows
    /// and is not an error.
    async fn remove_feed_by_url(&self, url: &str) -> Result<u64, String>;

    /// Single idempotent insert of the whole batch. Rows violating the
    /// `(website, url)` unique constraint are silently skipped; the number of
    /// rows actually inserted is not reported.
    async fn bulk_upsert_items(&self, rows: &[NewItem]) -> Result<(), String>;

    /// Urls among `urls` whose rows were inserted at or after `since`.
    async fn find_inserted_since(
        &self,
        website: i32,
        urls: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, String>;

    async fn get_item(&self, website: i32, url: &str) -> Result<Option<PersistedItem>, String>;

    /// Never fails; internal errors are swallowed after a stderr-level
    /// complaint.
    async fn log_error(&self, record: &NewErrorRecord);
}
