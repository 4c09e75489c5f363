//! Feed config persistence: load, url-keyed upsert pieces, delete.
use sqlx::PgPool;

use super::models::FeedRow;
use crate::domain::model::{FeedConfig, FeedDraft};

pub async fn get_all(pool: &PgPool) -> Result<Vec<FeedConfig>, String> {
    let rows = sqlx::query_as::<_, FeedRow>(
        "SELECT id, name, url, category, refresh, created_at FROM feeds ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("load feeds: {e}"))?;
    Ok(rows.into_iter().map(FeedConfig::from).collect())
}

pub async fn get_by_url(pool: &PgPool, url: &str) -> Result<Option<FeedConfig>, String> {
    let row = sqlx::query_as::<_, FeedRow>(
        "SELECT id, name, url, category, refresh, created_at FROM feeds WHERE url = $1",
    )
    .bind(url)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("find feed by url: {e}"))?;
    Ok(row.map(FeedConfig::from))
}

pub async fn insert(pool: &PgPool, draft: &FeedDraft) -> Result<FeedConfig, String> {
    let row = sqlx::query_as::<_, FeedRow>(
        r#"
        INSERT INTO feeds(name, url, category, refresh)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, url, category, refresh, created_at
        "#,
    )
    .bind(&draft.name)
    .bind(&draft.url)
    .bind(draft.category)
    .bind(draft.refresh_ms)
    .fetch_one(pool)
    .await
    .map_err(|e| format!("insert feed: {e}"))?;
    Ok(row.into())
}

pub async fn update(pool: &PgPool, config: &FeedConfig) -> Result<(), String> {
    sqlx::query("UPDATE feeds SET name = $2, category = $3, refresh = $4 WHERE url = $1")
        .bind(&config.url)
        .bind(&config.name)
        .bind(config.category)
        .bind(config.refresh_ms)
        .execute(pool)
        .await
        .map_err(|e| format!("update feed: {e}"))?;
    Ok(())
}

pub async fn remove_by_url(pool: &PgPool, url: &str) -> Result<u64, String> {
    let result = sqlx::query("DELETE FROM feeds WHERE url = $1")
        .bind(url)
        .execute(pool)
        .await
        .map_err(|e| format!("delete feed: {e}"))?;
    Ok(result.rows_affected())
}
