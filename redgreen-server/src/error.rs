//! Error types for redgreen-server
//!
//! Every handler returns `ApiResult<T>`; the variants map onto the status
//! codes the experiment client already understands.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use redgreen_common::time::iso_utc;
use serde_json::json;
use thiserror::Error;

const DUPLICATE_PID_MESSAGE: &str = "Oops! According to our records, it seems you have already done this experiment or had started an incomplete session. We apologise, as you may not be allowed to attempt the experiment. If you think this is a mistake, please reach out on Prolific.";

const MAX_PARTICIPANTS_MESSAGE: &str = "Oops! It seems the maximum number of participants have already started the experiment. We apologise, as you may not be allowed to attempt the experiment. If you think this is a mistake, please reach out on Prolific.";

/// Non-standard status used for unexpected failures while saving responses
pub const UNHANDLED_STATUS: u16 = 555;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid request field
    #[error("{message}")]
    Validation { status: StatusCode, message: String },

    /// Session, trial or experiment absent
    #[error("{message}")]
    NotFound { status: StatusCode, message: String },

    /// The session's progress record is gone (finished, timed out or ended)
    #[error("Experiment configuration not found")]
    ConfigurationMissing,

    /// Every profile slot is occupied
    #[error("max_participants_reached")]
    Capacity,

    /// Participant id already started a session
    #[error("duplicate_pid")]
    DuplicateParticipant,

    /// Session exceeded its time limit
    #[error("Session started at {start_time} has timed out")]
    TimedOut {
        start_time: DateTime<Utc>,
        current_time: DateTime<Utc>,
    },

    /// Sequencer reached a state its transition rules do not cover
    #[error("Unexpected condition: {0}")]
    InternalInconsistency(String),

    /// Unexpected failure reported with status 555
    #[error("{0}")]
    Unhandled(String),

    /// redgreen-common error
    #[error(transparent)]
    Common(#[from] redgreen_common::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Common(redgreen_common::Error::Database(err))
    }
}

impl ApiError {
    pub fn validation(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Validation {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::NotFound {
            status,
            message: message.into(),
        }
    }

    /// Collapse unexpected failures into `Unhandled`, keeping the
    /// validation and not-found responses intact
    pub fn into_unhandled(self) -> Self {
        match self {
            ApiError::Common(_) | ApiError::InternalInconsistency(_) => {
                ApiError::Unhandled(self.to_string())
            }
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { status, .. } | ApiError::NotFound { status, .. } => *status,
            ApiError::ConfigurationMissing => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Capacity | ApiError::DuplicateParticipant | ApiError::TimedOut { .. } => {
                StatusCode::FORBIDDEN
            }
            ApiError::InternalInconsistency(_) | ApiError::Common(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Unhandled(_) => StatusCode::from_u16(UNHANDLED_STATUS)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::Capacity => json!({
                "error": "max_participants_reached",
                "message": MAX_PARTICIPANTS_MESSAGE,
            }),
            ApiError::DuplicateParticipant => json!({
                "error": "duplicate_pid",
                "message": DUPLICATE_PID_MESSAGE,
            }),
            ApiError::TimedOut {
                start_time,
                current_time,
            } => json!({
                "error": "timeout",
                "message": "Your session has expired after the time limit.",
                "start_time_utc": iso_utc(*start_time),
                "current_time_utc": iso_utc(*current_time),
            }),
            other => json!({ "error": other.to_string() }),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, "Request failed: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
