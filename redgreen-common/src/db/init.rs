//! Database initialization
//!
//! Creates the SQLite file on first run and applies the schema. Every
//! statement is idempotent, so opening an existing database is safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL lets the monitoring endpoint read while a submission writes
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Each connection to `sqlite::memory:` is its own database, so the pool is
/// capped at one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_sessions_table(pool).await?;
    create_trials_table(pool).await?;
    create_key_frames_table(pool).await?;
    create_session_progress_table(pool).await?;
    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            experiment_name TEXT NOT NULL,
            profile_slot INTEGER NOT NULL,
            trial_order TEXT NOT NULL DEFAULT '[]',
            prolific_pid TEXT NOT NULL,
            study_id TEXT NOT NULL,
            prolific_session_id TEXT NOT NULL,
            start_time TIMESTAMP NOT NULL,
            end_time TIMESTAMP,
            time_taken_secs REAL,
            completed INTEGER NOT NULL DEFAULT 0,
            has_timed_out INTEGER NOT NULL DEFAULT 0,
            ignore_data INTEGER NOT NULL DEFAULT 0,
            average_score REAL,
            order_constraint_met INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_pid ON sessions(prolific_pid)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_trials_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES sessions(id),
            trial_kind TEXT NOT NULL CHECK (trial_kind IN ('ftrial', 'trial')),
            trial_index INTEGER NOT NULL,
            global_trial_name TEXT,
            counterbalance INTEGER NOT NULL DEFAULT 0,
            score REAL,
            completed INTEGER NOT NULL DEFAULT 0,
            start_time TIMESTAMP NOT NULL,
            end_time TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trials_session ON trials(session_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_key_frames_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS key_frames (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trial_id INTEGER NOT NULL REFERENCES trials(id),
            session_id INTEGER NOT NULL REFERENCES sessions(id),
            frame INTEGER NOT NULL,
            f_pressed INTEGER NOT NULL,
            j_pressed INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_key_frames_trial ON key_frames(trial_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_session_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_progress (
            session_id INTEGER PRIMARY KEY REFERENCES sessions(id),
            progress_json TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
