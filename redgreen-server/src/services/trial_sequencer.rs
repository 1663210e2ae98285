//! Serving the next scene of a session
//!
//! One call reads the session's progress, applies the transition rules in
//! `experiment::sequencer`, records a trial row for real scenes and writes
//! the progress back, all inside one transaction.

use crate::db::{progress, sessions, trials};
use crate::error::{ApiError, ApiResult};
use crate::experiment::{advance, Scene, TrialContent};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use redgreen_common::config::ServerConfig;
use redgreen_common::db::TrialKind;
use redgreen_common::time::elapsed_secs;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

/// Scene payload returned to the client
#[derive(Debug, Clone, Serialize)]
pub struct SceneResponse {
    #[serde(flatten)]
    pub content: TrialContent,
    #[serde(rename = "worldWidth")]
    pub world_width: u32,
    #[serde(rename = "worldHeight")]
    pub world_height: u32,
    pub counterbalance: bool,
    pub is_ftrial: bool,
    pub is_trial: bool,
    pub ftrial_i: usize,
    pub trial_i: usize,
    pub num_ftrials: usize,
    pub num_trials: usize,
    pub fam_to_exp_page: bool,
    pub finish: bool,
    pub average_score: f64,
    /// Trial row id, `-1` for transition and finish screens
    pub unique_trial_id: i64,
}

pub struct TrialSequencer {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl TrialSequencer {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    pub async fn next_scene(&self, session_id: i64, now: DateTime<Utc>) -> ApiResult<SceneResponse> {
        let mut tx = self.db.begin().await?;

        let session = sessions::get_session(&mut *tx, session_id).await?.ok_or_else(|| {
            ApiError::not_found(StatusCode::BAD_REQUEST, "Session not found in database")
        })?;

        let mut progress = progress::load_progress(&mut *tx, session_id)
            .await?
            .ok_or(ApiError::ConfigurationMissing)?;

        if progress.reconcile() {
            debug!(session_id, "Re-serving trial that was never scored");
        }

        let average_score = progress.average_score();
        sessions::set_average_score(&mut *tx, session_id, average_score).await?;

        let scene = advance(&mut progress).map_err(|e| ApiError::InternalInconsistency(e.to_string()))?;
        let content = scene
            .content(&progress)
            .map_err(|e| ApiError::InternalInconsistency(e.to_string()))?
            .clone();

        let mut counterbalance = false;
        let mut unique_trial_id = -1;

        if let Some((kind, index)) = scene.trial() {
            counterbalance = rand::random::<bool>();
            let global_trial_name = match kind {
                TrialKind::Ftrial => Some(format!("F{}", index + 1)),
                TrialKind::Trial => session.trial_order.get(index).cloned(),
            };

            unique_trial_id = trials::insert_trial(
                &mut *tx,
                session_id,
                kind,
                index,
                global_trial_name.as_deref(),
                counterbalance,
                now,
            )
            .await?;

            let (served, total) = match kind {
                TrialKind::Ftrial => (progress.ftrial_i, progress.num_ftrials()),
                TrialKind::Trial => (progress.trial_i, progress.num_trials()),
            };
            info!(
                pid = %session.prolific_pid,
                slot = session.profile_slot,
                session_id,
                kind = %kind,
                "Trial progress {}/{}",
                served,
                total
            );
        }

        let finish = scene == Scene::Finished;
        if finish {
            let time_taken = elapsed_secs(session.start_time, now);
            sessions::mark_completed(&mut *tx, session_id, now, time_taken).await?;
            progress::delete_progress(&mut *tx, session_id).await?;

            info!(
                session_id,
                pid = %session.prolific_pid,
                slot = session.profile_slot,
                time_taken_secs = time_taken,
                average_score,
                "Experiment completed"
            );
        } else {
            progress::save_progress(&mut *tx, session_id, &progress, now).await?;
        }

        tx.commit().await?;

        Ok(SceneResponse {
            content,
            world_width: self.config.world_width,
            world_height: self.config.world_height,
            counterbalance,
            is_ftrial: progress.is_ftrial,
            is_trial: progress.is_trial,
            ftrial_i: progress.ftrial_i,
            trial_i: progress.trial_i,
            num_ftrials: progress.num_ftrials(),
            num_trials: progress.num_trials(),
            fam_to_exp_page: progress.transition_to_exp_page,
            finish,
            average_score,
            unique_trial_id,
        })
    }
}
