//! Warn records: one row per (chat, user) pair with at least one active
//! warning. Rows are deleted on escalation or pardon.

use crate::store::Database;

pub async fn warn_count(
    db: &Database,
    chat_id: i64,
    user_id: i64,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar("SELECT warn_count FROM warnings WHERE chat_id = $1 AND user_id = $2")
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(db.pool())
        .await
}

pub async fn insert_warning(db: &Database, chat_id: i64, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO warnings (chat_id, user_id, warn_count) VALUES ($1, $2, 1)")
        .bind(chat_id)
        .bind(user_id)
        .execute(db.pool())
        .await?;
    Ok(())
}

pub async fn increment_warning(
    db: &Database,
    chat_id: i64,
    user_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE warnings SET warn_count = warn_count + 1 WHERE chat_id = $1 AND user_id = $2")
        .bind(chat_id)
        .bind(user_id)
        .execute(db.pool())
        .await?;
    Ok(())
}

/// Delete the warn record. Returns the number of removed rows.
pub async fn clear_warnings(db: &Database, chat_id: i64, user_id: i64) -> Result<u64, sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM warnings WHERE chat_id = $1 AND user_id = $2")
        .bind(chat_id)
        .bind(user_id)
        .execute(db.pool())
        .await?
        .rows_affected();
    Ok(deleted)
}
