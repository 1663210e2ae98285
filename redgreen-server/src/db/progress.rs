//! `session_progress` table queries

use crate::experiment::SessionProgress;
use chrono::{DateTime, Utc};
use redgreen_common::Result;
use sqlx::{Executor, Row, Sqlite};

pub async fn insert_progress<'e, E>(
    executor: E,
    session_id: i64,
    progress: &SessionProgress,
    now: DateTime<Utc>,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO session_progress (session_id, progress_json, updated_at) VALUES (?, ?, ?)")
        .bind(session_id)
        .bind(progress.to_json()?)
        .bind(now)
        .execute(executor)
        .await?;
    Ok(())
}

/// `None` once the session finished, timed out or was ended
pub async fn load_progress<'e, E>(executor: E, session_id: i64) -> Result<Option<SessionProgress>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT progress_json FROM session_progress WHERE session_id = ?")
        .bind(session_id)
        .fetch_optional(executor)
        .await?;

    match row {
        Some(row) => {
            let json: String = row.try_get("progress_json")?;
            Ok(Some(SessionProgress::from_json(&json)?))
        }
        None => Ok(None),
    }
}

/// Overwrite the stored progress; returns false if the row is gone
pub async fn save_progress<'e, E>(
    executor: E,
    session_id: i64,
    progress: &SessionProgress,
    now: DateTime<Utc>,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE session_progress SET progress_json = ?, updated_at = ? WHERE session_id = ?")
        .bind(progress.to_json()?)
        .bind(now)
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns true if a row was deleted
pub async fn delete_progress<'e, E>(executor: E, session_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM session_progress WHERE session_id = ?")
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
