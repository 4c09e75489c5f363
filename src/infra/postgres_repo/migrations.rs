//! Database migrations: create tables and indexes.
use sqlx::PgPool;
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS feeds (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        category INTEGER NOT NULL,
        refresh BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        category INTEGER NOT NULL,
        website INTEGER NOT NULL,
        date TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (website, url)
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS items_website_created_at_idx ON items (website, created_at)"#,
    r#"
    CREATE TABLE IF NOT EXISTS errors (
        id BIGSERIAL PRIMARY KEY,
        type TEXT NOT NULL,
        feed_id INTEGER,
        message TEXT NOT NULL,
        date TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

pub async fn migrate(pool: &PgPool) -> Result<(), String> {
    info!("DB migrate start");
    for ddl in SCHEMA {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| format!("migrate error: {e}"))?;
    }
    info!("DB migrate done");
    Ok(())
}
