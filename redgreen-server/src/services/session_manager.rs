//! Session start: duplicate check, slot assignment, content loading
//!
//! A slot is occupied by a session that completed, is still inside its
//! timeout window, or was flagged `ignore_data`. The smallest free slot in
//! `[0, max_slots)` is assigned. Two starts racing for the same slot may both
//! get it; assignment is best-effort.
//!
//! Reassigning a slot applies the timeout to the session that held it: its
//! progress record is deleted in the same transaction as the new session.

use crate::db::{progress, sessions};
use crate::error::{ApiError, ApiResult};
use crate::experiment::{ExperimentCatalog, SessionProgress};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use redgreen_common::config::ServerConfig;
use redgreen_common::db::SessionRecord;
use redgreen_common::time::{has_expired, iso_utc, rfc3339};
use redgreen_common::Error;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Participant identifiers passed on the start URL
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub prolific_pid: String,
    pub study_id: String,
    pub prolific_session_id: String,
}

impl Default for StartRequest {
    fn default() -> Self {
        Self {
            prolific_pid: "default_pid".to_string(),
            study_id: "debug_study".to_string(),
            prolific_session_id: "debug_session".to_string(),
        }
    }
}

/// Response body of a successful start
#[derive(Debug, Clone, Serialize)]
pub struct StartedSession {
    pub session_id: i64,
    pub experiment_name: String,
    pub num_trials: usize,
    pub num_ftrials: usize,
    pub timeout_period_seconds: f64,
    pub check_timeout_interval_seconds: f64,
    pub start_time_utc: String,
}

/// Counts logged after every start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub completed: usize,
    pub active: usize,
    /// Expired without a timeout check (participant closed the page)
    pub timed_out_after_exit: usize,
    /// Expired and flagged by a timeout check while the page was open
    pub timed_out_while_live: usize,
}

impl SessionStats {
    pub fn from_sessions(all: &[SessionRecord], config: &ServerConfig, now: DateTime<Utc>) -> Self {
        let period = config.timeout_period();
        let mut stats = SessionStats::default();
        let mut expired = 0;

        for session in all {
            if session.completed {
                stats.completed += 1;
            } else if has_expired(session.start_time, period, now) {
                expired += 1;
            } else {
                stats.active += 1;
            }
            if session.has_timed_out {
                stats.timed_out_while_live += 1;
            }
        }

        stats.timed_out_after_exit = expired - stats.timed_out_while_live.min(expired);
        stats
    }
}

/// Whether `session` holds its profile slot at `now`
pub fn occupies_slot(session: &SessionRecord, config: &ServerConfig, now: DateTime<Utc>) -> bool {
    session.ignore_data
        || session.completed
        || !has_expired(session.start_time, config.timeout_period(), now)
}

/// Unfinished sessions whose slot is free again; `has_timed_out` is left as is
fn holds_stale_progress(session: &SessionRecord, config: &ServerConfig, now: DateTime<Utc>) -> bool {
    !occupies_slot(session, config, now)
}

/// Slots in `[0, max_slots)` not held by any session
pub fn free_slots(all: &[SessionRecord], config: &ServerConfig, now: DateTime<Utc>) -> Vec<u32> {
    let occupied: BTreeSet<i64> = all
        .iter()
        .filter(|s| occupies_slot(s, config, now))
        .map(|s| s.profile_slot)
        .collect();

    (0..config.max_slots())
        .filter(|slot| !occupied.contains(&i64::from(*slot)))
        .collect()
}

pub struct SessionManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    catalog: Arc<ExperimentCatalog>,
}

impl SessionManager {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>, catalog: Arc<ExperimentCatalog>) -> Self {
        Self { db, config, catalog }
    }

    /// Create a session and its progress record
    ///
    /// Checks run in order: duplicate participant, capacity, experiment.
    pub async fn start(
        &self,
        experiment_name: &str,
        request: &StartRequest,
        now: DateTime<Utc>,
    ) -> ApiResult<StartedSession> {
        if !self.config.is_placeholder_pid(&request.prolific_pid)
            && sessions::pid_exists(&self.db, &request.prolific_pid).await?
        {
            info!(pid = %request.prolific_pid, "Rejected returning participant");
            return Err(ApiError::DuplicateParticipant);
        }

        let all = sessions::list_sessions(&self.db).await?;
        let Some(slot) = free_slots(&all, &self.config, now).first().copied() else {
            info!(pid = %request.prolific_pid, "Rejected start: all profile slots occupied");
            return Err(ApiError::Capacity);
        };

        let not_found = || {
            ApiError::not_found(
                StatusCode::NOT_FOUND,
                format!("Experiment '{}' not found", experiment_name),
            )
        };
        if !self.catalog.contains(experiment_name) {
            return Err(not_found());
        }
        // Dataset files are read on first use
        let catalog = Arc::clone(&self.catalog);
        let name = experiment_name.to_string();
        let loaded = tokio::task::spawn_blocking(move || catalog.load_for_slot(&name, slot))
            .await
            .map_err(|e| Error::Internal(format!("Dataset loading task failed: {}", e)))??
            .ok_or_else(not_found)?;

        let progress = SessionProgress::new(loaded.ftrials, loaded.trials);
        let num_ftrials = progress.num_ftrials();
        let num_trials = progress.num_trials();

        let mut tx = self.db.begin().await?;

        // Expired sessions lose their progress once their slot can be reassigned
        for stale in all.iter().filter(|s| holds_stale_progress(s, &self.config, now)) {
            if progress::delete_progress(&mut *tx, stale.id).await? {
                info!(session_id = stale.id, slot = stale.profile_slot, "Dropped progress of expired session");
            }
        }

        let session_id = sessions::insert_session(
            &mut *tx,
            &sessions::NewSession {
                experiment_name,
                profile_slot: slot,
                trial_order: &loaded.trial_order,
                prolific_pid: &request.prolific_pid,
                study_id: &request.study_id,
                prolific_session_id: &request.prolific_session_id,
                start_time: now,
                order_constraint_met: loaded.order_constraint_met,
            },
        )
        .await?;
        progress::insert_progress(&mut *tx, session_id, &progress, now).await?;
        tx.commit().await?;

        info!(
            pid = %request.prolific_pid,
            slot,
            session_id,
            study_id = %request.study_id,
            prolific_session_id = %request.prolific_session_id,
            start_time = %rfc3339(now),
            "New experiment session started"
        );

        let all = sessions::list_sessions(&self.db).await?;
        let stats = SessionStats::from_sessions(&all, &self.config, now);
        info!(
            completed = stats.completed,
            active = stats.active,
            timed_out_after_exit = stats.timed_out_after_exit,
            timed_out_while_live = stats.timed_out_while_live,
            "Session statistics"
        );

        Ok(StartedSession {
            session_id,
            experiment_name: experiment_name.to_string(),
            num_trials,
            num_ftrials,
            timeout_period_seconds: self.config.timeout_period().num_seconds() as f64,
            check_timeout_interval_seconds: self.config.check_timeout_interval().num_seconds() as f64,
            start_time_utc: iso_utc(now),
        })
    }

    /// Profile slots still open at `now`
    pub async fn remaining_slots(&self, now: DateTime<Utc>) -> ApiResult<Vec<u32>> {
        let all = sessions::list_sessions(&self.db).await?;
        Ok(free_slots(&all, &self.config, now))
    }
}
