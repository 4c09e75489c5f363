//! Row types mapped from the store.
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::model::{FeedConfig, PersistedItem};

#[derive(Debug, FromRow)]
pub struct FeedRow {
    pub id: i32,
    pub name: String,
    pub url: String,
    pub category: i32,
    pub refresh: i64,
    pub created_at: DateTime<Utc>,
}

impl From<FeedRow> for FeedConfig {
    fn from(row: FeedRow) -> Self {
        FeedConfig {
            id: row.id,
            name: row.name,
            url: row.url,
            category: row.category,
            refresh_ms: row.refresh,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ItemRow {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub category: i32,
    pub website: i32,
    pub date: DateTime<Utc>,
}

impl From<ItemRow> for PersistedItem {
    fn from(row: ItemRow) -> Self {
        PersistedItem {
            id: row.id,
            title: row.title,
            url: row.url,
            category: row.category,
            website: row.website,
            date: row.date,
        }
    }
}
