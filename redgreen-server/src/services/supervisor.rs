//! Timeout checks and early session end

use crate::db::{progress, sessions};
use crate::error::{ApiError, ApiResult};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use redgreen_common::config::ServerConfig;
use redgreen_common::db::SessionRecord;
use redgreen_common::time::has_expired;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimeoutStatus {
    pub status: &'static str,
}

pub struct TimeoutSupervisor {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl TimeoutSupervisor {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    async fn session(&self, session_id: i64) -> ApiResult<SessionRecord> {
        sessions::get_session(&self.db, session_id)
            .await?
            .ok_or_else(|| ApiError::not_found(StatusCode::NOT_FOUND, "Session not found"))
    }

    /// Flag an expired session and drop its progress
    ///
    /// Returns `TimedOut` once the session is past its window; completed
    /// sessions never time out.
    pub async fn check(&self, session_id: i64, now: DateTime<Utc>) -> ApiResult<TimeoutStatus> {
        let session = self.session(session_id).await?;

        if !session.completed && has_expired(session.start_time, self.config.timeout_period(), now) {
            let mut tx = self.db.begin().await?;
            sessions::mark_timed_out(&mut *tx, session_id).await?;
            progress::delete_progress(&mut *tx, session_id).await?;
            tx.commit().await?;

            info!(
                session_id,
                pid = %session.prolific_pid,
                slot = session.profile_slot,
                "Session timed out"
            );

            return Err(ApiError::TimedOut {
                start_time: session.start_time,
                current_time: now,
            });
        }

        Ok(TimeoutStatus { status: "active" })
    }

    /// Drop the progress of a session the participant left early
    ///
    /// Idempotent; the timeout flag is left alone.
    pub async fn end_session(&self, session_id: i64) -> ApiResult<()> {
        self.session(session_id).await?;

        if progress::delete_progress(&self.db, session_id).await? {
            info!(session_id, "Deleted progress for ended session");
        }
        Ok(())
    }
}
