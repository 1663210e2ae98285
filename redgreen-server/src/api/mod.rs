//! HTTP API handlers for redgreen-server

pub mod experiment;
pub mod health;
pub mod sessions;
pub mod supervisor;

pub use experiment::{load_next_scene, save_data, start_experiment};
pub use health::health_routes;
pub use sessions::{list_sessions, set_ignore};
pub use supervisor::{check_timeout, end_session};

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Deserializer};

use crate::error::{ApiError, ApiResult};

/// Accept a session or trial id as `5` or `"5"`
///
/// The browser client keeps ids in `sessionStorage`, which hands them back
/// as strings. `null` and `""` read as absent.
pub fn flexible_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Int(i64),
        Text(String),
    }

    match Option::<Id>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Id::Int(id)) => Ok(Some(id)),
        Some(Id::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                Ok(None)
            } else {
                text.parse()
                    .map(Some)
                    .map_err(|_| serde::de::Error::custom(format!("invalid id: {:?}", text)))
            }
        }
    }
}

/// Unwrap a JSON body, turning extractor rejections into a JSON 400
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::validation(StatusCode::BAD_REQUEST, rejection.body_text()))
}

/// Body of the requests that only carry a session id
#[derive(Debug, Default, Deserialize)]
pub struct SessionIdRequest {
    #[serde(default, deserialize_with = "flexible_id")]
    pub session_id: Option<i64>,
}
