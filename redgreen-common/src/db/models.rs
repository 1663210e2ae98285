//! Database models

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Trial category stored in `trials.trial_kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialKind {
    /// Practice scene shown before data collection
    Ftrial,
    /// Data-collection scene
    Trial,
}

impl TrialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialKind::Ftrial => "ftrial",
            TrialKind::Trial => "trial",
        }
    }
}

impl fmt::Display for TrialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrialKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ftrial" => Ok(TrialKind::Ftrial),
            "trial" => Ok(TrialKind::Trial),
            other => Err(Error::InvalidInput(format!("Unknown trial kind: {}", other))),
        }
    }
}

/// One participant attempt (`sessions` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub experiment_name: String,
    pub profile_slot: i64,
    /// Experimental trial names in presentation order
    pub trial_order: Vec<String>,
    pub prolific_pid: String,
    pub study_id: String,
    pub prolific_session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub time_taken_secs: Option<f64>,
    pub completed: bool,
    pub has_timed_out: bool,
    pub ignore_data: bool,
    pub average_score: Option<f64>,
    pub order_constraint_met: bool,
}

impl SessionRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let trial_order: String = row.try_get("trial_order")?;
        Ok(Self {
            id: row.try_get("id")?,
            experiment_name: row.try_get("experiment_name")?,
            profile_slot: row.try_get("profile_slot")?,
            trial_order: serde_json::from_str(&trial_order)?,
            prolific_pid: row.try_get("prolific_pid")?,
            study_id: row.try_get("study_id")?,
            prolific_session_id: row.try_get("prolific_session_id")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            time_taken_secs: row.try_get("time_taken_secs")?,
            completed: row.try_get("completed")?,
            has_timed_out: row.try_get("has_timed_out")?,
            ignore_data: row.try_get("ignore_data")?,
            average_score: row.try_get("average_score")?,
            order_constraint_met: row.try_get("order_constraint_met")?,
        })
    }
}

/// One presented scene instance (`trials` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub id: i64,
    pub session_id: i64,
    pub kind: TrialKind,
    pub trial_index: i64,
    pub global_trial_name: Option<String>,
    pub counterbalance: bool,
    pub score: Option<f64>,
    pub completed: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TrialRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let kind: String = row.try_get("trial_kind")?;
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            kind: kind.parse()?,
            trial_index: row.try_get("trial_index")?,
            global_trial_name: row.try_get("global_trial_name")?,
            counterbalance: row.try_get("counterbalance")?,
            score: row.try_get("score")?,
            completed: row.try_get("completed")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
        })
    }
}

/// Key state for one animation frame (`key_frames` table)
///
/// `f_pressed` / `j_pressed` hold the values after the counterbalance swap,
/// so `f_pressed` always reads as a red response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFrameSample {
    pub frame: i64,
    pub f_pressed: bool,
    pub j_pressed: bool,
}

impl KeyFrameSample {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            frame: row.try_get("frame")?,
            f_pressed: row.try_get("f_pressed")?,
            j_pressed: row.try_get("j_pressed")?,
        })
    }
}
