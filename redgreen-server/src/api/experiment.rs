//! Experiment flow: start, next scene, save responses

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{flexible_id, json_body, SessionIdRequest};
use crate::error::{ApiError, ApiResult};
use crate::experiment::RecordedFrame;
use crate::services::{
    SceneResponse, Scorer, SessionManager, StartRequest, StartedSession, Submission, TrialSequencer,
};
use crate::AppState;
use redgreen_common::time::now;

/// Participant identifiers on the start URL
#[derive(Debug, Default, Deserialize)]
pub struct StartQuery {
    #[serde(rename = "PROLIFIC_PID")]
    pub prolific_pid: Option<String>,
    #[serde(rename = "STUDY_ID")]
    pub study_id: Option<String>,
    #[serde(rename = "SESSION_ID")]
    pub session_id: Option<String>,
}

impl From<StartQuery> for StartRequest {
    fn from(query: StartQuery) -> Self {
        let defaults = StartRequest::default();
        StartRequest {
            prolific_pid: query.prolific_pid.unwrap_or(defaults.prolific_pid),
            study_id: query.study_id.unwrap_or(defaults.study_id),
            prolific_session_id: query.session_id.unwrap_or(defaults.prolific_session_id),
        }
    }
}

/// POST /start_experiment/:experiment_name
pub async fn start_experiment(
    State(state): State<AppState>,
    Path(experiment_name): Path<String>,
    Query(query): Query<StartQuery>,
) -> ApiResult<Json<StartedSession>> {
    let manager = SessionManager::new(
        state.db.clone(),
        state.config.clone(),
        state.catalog.clone(),
    );
    let started = manager.start(&experiment_name, &query.into(), now()).await?;
    Ok(Json(started))
}

/// POST /load_next_scene
pub async fn load_next_scene(
    State(state): State<AppState>,
    payload: Result<Json<SessionIdRequest>, JsonRejection>,
) -> ApiResult<Json<SceneResponse>> {
    let session_id = json_body(payload)?
        .session_id
        .ok_or_else(|| ApiError::validation(StatusCode::BAD_REQUEST, "Session not found"))?;

    let sequencer = TrialSequencer::new(state.db.clone(), state.config.clone());
    Ok(Json(sequencer.next_scene(session_id, now()).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveDataRequest {
    #[serde(default, deserialize_with = "flexible_id")]
    pub session_id: Option<i64>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub unique_trial_id: Option<i64>,
    #[serde(default, rename = "recordedKeyStates")]
    pub recorded_key_states: Vec<RecordedFrame>,
    #[serde(default)]
    pub counterbalance: bool,
}

#[derive(Debug, Serialize)]
pub struct SaveDataResponse {
    pub status: &'static str,
    pub score: f64,
}

/// POST /save_data
///
/// Failures other than request validation and a missing progress record
/// are reported with status 555, including bodies that do not parse.
pub async fn save_data(
    State(state): State<AppState>,
    payload: Result<Json<SaveDataRequest>, JsonRejection>,
) -> ApiResult<Json<SaveDataResponse>> {
    let Json(request) = payload.map_err(|rejection| ApiError::Unhandled(rejection.body_text()))?;
    let submission = Submission {
        session_id: request.session_id,
        unique_trial_id: request.unique_trial_id,
        counterbalance: request.counterbalance,
        frames: request.recorded_key_states,
    };

    let score = Scorer::new(state.db.clone())
        .submit(&submission, now())
        .await
        .map_err(ApiError::into_unhandled)?;

    Ok(Json(SaveDataResponse {
        status: "success",
        score,
    }))
}
