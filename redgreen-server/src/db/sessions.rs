//! `sessions` table queries

use chrono::{DateTime, Utc};
use redgreen_common::db::SessionRecord;
use redgreen_common::Result;
use sqlx::{Executor, Sqlite};

/// Fields supplied when a session is created
#[derive(Debug, Clone)]
pub struct NewSession<'a> {
    pub experiment_name: &'a str,
    pub profile_slot: u32,
    pub trial_order: &'a [String],
    pub prolific_pid: &'a str,
    pub study_id: &'a str,
    pub prolific_session_id: &'a str,
    pub start_time: DateTime<Utc>,
    pub order_constraint_met: bool,
}

/// Insert a session and return its id
pub async fn insert_session<'e, E>(executor: E, session: &NewSession<'_>) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let trial_order = serde_json::to_string(session.trial_order)?;
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (
            experiment_name, profile_slot, trial_order,
            prolific_pid, study_id, prolific_session_id,
            start_time, order_constraint_met
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.experiment_name)
    .bind(session.profile_slot as i64)
    .bind(trial_order)
    .bind(session.prolific_pid)
    .bind(session.study_id)
    .bind(session.prolific_session_id)
    .bind(session.start_time)
    .bind(session.order_constraint_met)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_session<'e, E>(executor: E, session_id: i64) -> Result<Option<SessionRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
        .bind(session_id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(SessionRecord::from_row).transpose()
}

pub async fn list_sessions<'e, E>(executor: E) -> Result<Vec<SessionRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT * FROM sessions ORDER BY id")
        .fetch_all(executor)
        .await?;

    rows.iter().map(SessionRecord::from_row).collect()
}

/// Whether any session (in any state) used this participant id
pub async fn pid_exists<'e, E>(executor: E, prolific_pid: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sessions WHERE prolific_pid = ?)")
            .bind(prolific_pid)
            .fetch_one(executor)
            .await?;
    Ok(exists)
}

pub async fn set_average_score<'e, E>(executor: E, session_id: i64, average: f64) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE sessions SET average_score = ? WHERE id = ?")
        .bind(average)
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn mark_completed<'e, E>(
    executor: E,
    session_id: i64,
    end_time: DateTime<Utc>,
    time_taken_secs: f64,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE sessions SET completed = 1, end_time = ?, time_taken_secs = ? WHERE id = ?")
        .bind(end_time)
        .bind(time_taken_secs)
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn mark_timed_out<'e, E>(executor: E, session_id: i64) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE sessions SET has_timed_out = 1 WHERE id = ?")
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Returns false when no session has this id
pub async fn set_ignore_data<'e, E>(executor: E, session_id: i64, ignore: bool) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE sessions SET ignore_data = ? WHERE id = ?")
        .bind(ignore)
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
