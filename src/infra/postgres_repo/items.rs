//! Item history: bulk idempotent insert and the post-insert probe.
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::ItemRow;
use crate::domain::model::{NewItem, PersistedItem};

pub async fn bulk_upsert(pool: &PgPool, rows: &[NewItem]) -> Result<(), String> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await.map_err(|e| format!("tx begin: {e}"))?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO items(title, url, category, website, date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (website, url) DO NOTHING
            "#,
        )
        .bind(&row.title)
        .bind(&row.url)
        .bind(row.category)
        .bind(row.website)
        .bind(row.date)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("insert item: {e}"))?;
    }
    tx.commit().await.map_err(|e| format!("tx commit: {e}"))?;
    Ok(())
}

pub async fn find_inserted_since(
    pool: &PgPool,
    website: i32,
    urls: &[String],
    since: DateTime<Utc>,
) -> Result<Vec<String>, String> {
    sqlx::query_scalar::<_, String>(
        "SELECT url FROM items WHERE website = $1 AND url = ANY($2) AND created_at >= $3",
    )
    .bind(website)
    .bind(urls)
    .bind(since)
    .fetch_all(pool)
    .await
    .map_err(|e| format!("probe inserted items: {e}"))
}

pub async fn get(pool: &PgPool, website: i32, url: &str) -> Result<Option<PersistedItem>, String> {
    let row = sqlx::query_as::<_, ItemRow>(
        "SELECT id, title, url, category, website, date FROM items WHERE website = $1 AND url = $2",
    )
    .bind(website)
    .bind(url)
    .fetch_optional(pool)
    .await
    .map_err(|e| format!("load item: {e}"))?;
    Ok(row.map(PersistedItem::from))
}
