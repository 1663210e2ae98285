//! Monitoring endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::json_body;
use crate::error::ApiResult;
use crate::services::{SessionMonitor, SessionSummary};
use crate::AppState;

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<Vec<SessionSummary>>> {
    Ok(Json(SessionMonitor::new(state.db.clone()).summaries().await?))
}

#[derive(Debug, Deserialize)]
pub struct IgnoreRequest {
    pub ignore: bool,
}

/// POST /sessions/:id/ignore
pub async fn set_ignore(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    payload: Result<Json<IgnoreRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let request = json_body(payload)?;
    SessionMonitor::new(state.db.clone())
        .set_ignore(session_id, request.ignore)
        .await?;
    Ok(Json(json!({ "id": session_id, "ignore_data": request.ignore })))
}
