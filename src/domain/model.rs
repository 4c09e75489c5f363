//! Core data model: feed configuration, in-flight and persisted items.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persistent configuration of one syndication source. `url` is unique across
/// all configs and is the primary key for external identity.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub id: i32,
    pub name: String,
    pub url: String,
    pub category: i32,
    pub refresh_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// A feed config as received from a command or a config seed, before the
/// store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedDraft {
    #[serde(default)]
    pub name: String,
    pub url: String,
    pub category: i32,
    #[serde(rename = "refresh")]
    pub refresh_ms: i64,
}

impl FeedDraft {
    /// Boundary validation applied before any store write. The refresh must
    /// be positive and strictly above the fetch timeout.
    pub fn validate(&self, min_refresh_ms: i64) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("feed url cannot be empty".to_string());
        }
        if self.refresh_ms <= 0 {
            return Err(format!(
                "feed refresh must be positive, got {}",
                self.refresh_ms
            ));
        }
        if self.refresh_ms <= min_refresh_ms {
            return Err(format!(
                "feed refresh {}ms must exceed the fetch timeout {}ms",
                self.refresh_ms, min_refresh_ms
            ));
        }
        Ok(())
    }
}

/// One parsed entry between fetch and persistence. The url is canonicalized
/// before any store interaction; the date is the publication time as reported
/// by the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub url: String,
    pub date: Option<DateTime<Utc>>,
    pub category: i32,
    pub website: i32,
}

/// Row shape submitted to the bulk idempotent upsert. `date` falls back to
/// processing time when the publication time was unusable.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub title: String,
    pub url: String,
    pub category: i32,
    pub website: i32,
    pub date: DateTime<Utc>,
}

/// An item as stored, identity assigned by the store. Serializes to the shape
/// published inside the item envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedItem {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub category: i32,
    pub website: i32,
    pub date: DateTime<Utc>,
}
