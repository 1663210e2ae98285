//! Session summaries for the monitoring dashboard

use crate::db::{key_frames, sessions, trials};
use crate::error::{ApiError, ApiResult};
use axum::http::StatusCode;
use redgreen_common::db::{KeyFrameSample, SessionRecord, TrialKind};
use redgreen_common::time::iso_utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrialScore {
    pub trial_index: i64,
    pub score: Option<f64>,
}

/// Per-frame response flags across a session's experimental trials
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TimeSeries {
    pub red: Vec<bool>,
    pub green: Vec<bool>,
    pub uncertain: Vec<bool>,
}

impl TimeSeries {
    fn from_samples(samples: &[KeyFrameSample]) -> Self {
        let mut series = TimeSeries::default();
        for sample in samples {
            series.red.push(sample.f_pressed);
            series.green.push(sample.j_pressed);
            series.uncertain.push(!(sample.f_pressed || sample.j_pressed));
        }
        series
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: i64,
    pub start_time: String,
    pub study_id: String,
    pub average_score: Option<f64>,
    pub prolific_pid: String,
    pub completed: bool,
    pub prolific_session_id: String,
    pub num_ftrials_completed: usize,
    pub num_trials_completed: usize,
    pub trial_scores: Vec<TrialScore>,
    pub time_series_data: TimeSeries,
}

pub struct SessionMonitor {
    db: SqlitePool,
}

impl SessionMonitor {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn summaries(&self) -> ApiResult<Vec<SessionSummary>> {
        let all = sessions::list_sessions(&self.db).await?;
        let mut result = Vec::with_capacity(all.len());
        for session in all {
            result.push(self.summarize(session).await?);
        }
        Ok(result)
    }

    async fn summarize(&self, session: SessionRecord) -> ApiResult<SessionSummary> {
        let done = trials::completed_trials(&self.db, session.id, TrialKind::Trial).await?;
        let fam_done = trials::completed_trials(&self.db, session.id, TrialKind::Ftrial).await?;
        let samples = key_frames::experimental_samples(&self.db, session.id).await?;

        Ok(SessionSummary {
            id: session.id,
            start_time: iso_utc(session.start_time),
            study_id: session.study_id,
            average_score: session.average_score,
            prolific_pid: session.prolific_pid,
            completed: session.completed,
            prolific_session_id: session.prolific_session_id,
            num_ftrials_completed: fam_done.len(),
            num_trials_completed: done.len(),
            trial_scores: done
                .iter()
                .map(|t| TrialScore {
                    trial_index: t.trial_index,
                    score: t.score,
                })
                .collect(),
            time_series_data: TimeSeries::from_samples(&samples),
        })
    }

    /// Exclude (or re-include) a session from the data set
    ///
    /// An ignored session keeps its profile slot permanently.
    pub async fn set_ignore(&self, session_id: i64, ignore: bool) -> ApiResult<()> {
        if !sessions::set_ignore_data(&self.db, session_id, ignore).await? {
            return Err(ApiError::not_found(StatusCode::NOT_FOUND, "Session not found"));
        }
        info!(session_id, ignore, "Updated ignore_data flag");
        Ok(())
    }
}
