//! Scoring a submitted trial
//!
//! Validation happens before anything is written. The samples, the trial's
//! score and the progress update then commit together; a progress record
//! removed by a concurrent timeout rolls the whole submission back.

use crate::db::{key_frames, progress, sessions, trials};
use crate::error::{ApiError, ApiResult};
use crate::experiment::scoring;
use crate::experiment::{KeyTally, RecordedFrame};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

/// One `save_data` request
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub session_id: Option<i64>,
    pub unique_trial_id: Option<i64>,
    pub counterbalance: bool,
    pub frames: Vec<RecordedFrame>,
}

pub struct Scorer {
    db: SqlitePool,
}

impl Scorer {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Score the submission and return the score
    pub async fn submit(&self, submission: &Submission, now: DateTime<Utc>) -> ApiResult<f64> {
        let session_id = submission.session_id.ok_or_else(|| {
            ApiError::validation(StatusCode::UNAUTHORIZED, "Session ID not provided")
        })?;

        if sessions::get_session(&self.db, session_id).await?.is_none() {
            return Err(ApiError::validation(
                StatusCode::PAYMENT_REQUIRED,
                "Session not found in database",
            ));
        }

        let trial = match submission.unique_trial_id {
            Some(trial_id) => trials::get_trial(&self.db, trial_id).await?,
            None => None,
        };
        let trial = trial.filter(|t| t.session_id == session_id).ok_or_else(|| {
            ApiError::validation(
                StatusCode::METHOD_NOT_ALLOWED,
                "Trial not found for the current session",
            )
        })?;

        if submission.frames.is_empty() {
            return Err(ApiError::validation(
                StatusCode::NOT_ACCEPTABLE,
                "No key state data provided",
            ));
        }

        let (tally, samples) = KeyTally::from_frames(&submission.frames, submission.counterbalance);

        let mut tx = self.db.begin().await?;

        let mut progress = progress::load_progress(&mut *tx, session_id)
            .await?
            .ok_or(ApiError::ConfigurationMissing)?;

        key_frames::insert_samples(&mut *tx, trial.id, session_id, &samples).await?;

        let outcome = progress.current_content().and_then(|c| c.rg_outcome);
        let score = scoring::score(&tally, outcome);
        progress.record_score(score);

        trials::complete_trial(&mut *tx, trial.id, score, now).await?;
        if !progress::save_progress(&mut *tx, session_id, &progress, now).await? {
            return Err(ApiError::ConfigurationMissing);
        }

        tx.commit().await?;

        debug!(
            session_id,
            trial_id = trial.id,
            red = tally.red,
            green = tally.green,
            uncertain = tally.uncertain(),
            score,
            "Saved trial responses"
        );

        Ok(score)
    }
}
