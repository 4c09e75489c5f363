//! Error store writes; failures here never propagate.
use sqlx::PgPool;
use tracing::error;

use crate::domain::error::NewErrorRecord;

pub async fn log(pool: &PgPool, record: &NewErrorRecord) {
    let result = sqlx::query("INSERT INTO errors(type, feed_id, message) VALUES ($1, $2, $3)")
        .bind(record.kind.tag())
        .bind(record.feed_id)
        .bind(&record.message)
        .execute(pool)
        .await;
    if let Err(e) = result {
        error!(error = %e, kind = record.kind.tag(), "Failed to record error");
    }
}
