//! Timeout polling and early session end

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{json_body, SessionIdRequest};
use crate::error::{ApiError, ApiResult};
use crate::services::{TimeoutStatus, TimeoutSupervisor};
use crate::AppState;
use redgreen_common::time::now;

fn require_session_id(payload: Result<Json<SessionIdRequest>, JsonRejection>) -> ApiResult<i64> {
    json_body(payload)?
        .session_id
        .ok_or_else(|| ApiError::validation(StatusCode::BAD_REQUEST, "Session ID not provided"))
}

/// POST /check_timeout
pub async fn check_timeout(
    State(state): State<AppState>,
    payload: Result<Json<SessionIdRequest>, JsonRejection>,
) -> ApiResult<Json<TimeoutStatus>> {
    let session_id = require_session_id(payload)?;
    let supervisor = TimeoutSupervisor::new(state.db.clone(), state.config.clone());
    Ok(Json(supervisor.check(session_id, now()).await?))
}

/// POST /end_session
pub async fn end_session(
    State(state): State<AppState>,
    payload: Result<Json<SessionIdRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let session_id = require_session_id(payload)?;
    let supervisor = TimeoutSupervisor::new(state.db.clone(), state.config.clone());
    supervisor.end_session(session_id).await?;

    Ok(Json(json!({
        "message": "Session ended and configuration deleted successfully."
    })))
}
