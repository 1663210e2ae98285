//! `trials` table queries

use chrono::{DateTime, Utc};
use redgreen_common::db::{TrialKind, TrialRecord};
use redgreen_common::Result;
use sqlx::{Executor, Sqlite};

/// Insert a served trial and return its id
pub async fn insert_trial<'e, E>(
    executor: E,
    session_id: i64,
    kind: TrialKind,
    trial_index: usize,
    global_trial_name: Option<&str>,
    counterbalance: bool,
    start_time: DateTime<Utc>,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO trials (
            session_id, trial_kind, trial_index, global_trial_name,
            counterbalance, start_time
        )
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session_id)
    .bind(kind.as_str())
    .bind(trial_index as i64)
    .bind(global_trial_name)
    .bind(counterbalance)
    .bind(start_time)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_trial<'e, E>(executor: E, trial_id: i64) -> Result<Option<TrialRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM trials WHERE id = ?")
        .bind(trial_id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(TrialRecord::from_row).transpose()
}

/// Record the score of a submitted trial
pub async fn complete_trial<'e, E>(
    executor: E,
    trial_id: i64,
    score: f64,
    end_time: DateTime<Utc>,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE trials SET score = ?, completed = 1, end_time = ? WHERE id = ?")
        .bind(score)
        .bind(end_time)
        .bind(trial_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Completed trials of one kind, in insertion order
pub async fn completed_trials<'e, E>(
    executor: E,
    session_id: i64,
    kind: TrialKind,
) -> Result<Vec<TrialRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT * FROM trials WHERE session_id = ? AND trial_kind = ? AND completed = 1 ORDER BY id",
    )
    .bind(session_id)
    .bind(kind.as_str())
    .fetch_all(executor)
    .await?;

    rows.iter().map(TrialRecord::from_row).collect()
}
