// crates/backend-lib/src/error.rs

//! Central error types + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use huddle_common::ServerEvent;
use thiserror::Error;

use crate::meeting::RecordingError;
use crate::polls::PollError;
use crate::validation::ValidationError;

/// HTTP-facing application errors with error codes
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Meeting not found")]
    MeetingNotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::MeetingNotFound => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NF_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
            AppError::MeetingNotFound => "MEETING_001",
            AppError::Forbidden(_) => "PERM_001",
            AppError::InvalidInput(_) => "VAL_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Io(_) => "An internal server error occurred".to_string(),
            AppError::Json(_) => "Invalid request format".to_string(),
            AppError::NotFound(_) | AppError::MeetingNotFound => "Resource not found".to_string(),
            // These carry messages meant for the user
            AppError::Forbidden(msg) | AppError::InvalidInput(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{self}");
        }

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Rejection of a real-time event.
///
/// Messages are free text meant to be shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("You are not in a meeting")]
    NotInMeeting,

    #[error("Meeting not found")]
    MeetingNotFound,

    #[error("Meeting {0} is already in progress")]
    MeetingAlreadyActive(String),

    #[error("Meeting {0} has ended")]
    MeetingEnded(String),

    #[error("You are already in a meeting")]
    AlreadyInMeeting,

    #[error("This meeting is locked by the host")]
    MeetingLocked,

    #[error("Participant not found")]
    ParticipantNotFound,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotPermitted(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error("Malformed message: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Outbound event for a failed `join-as-host` / `join-meeting`
    pub fn to_join_event(&self) -> ServerEvent {
        match self {
            GatewayError::MeetingLocked => ServerEvent::MeetingLocked {
                message: self.to_string(),
            },
            _ => ServerEvent::MeetingError {
                message: self.to_string(),
            },
        }
    }

    /// Outbound event for any other rejected request
    pub fn to_action_event(&self) -> ServerEvent {
        ServerEvent::ActionError {
            message: self.to_string(),
        }
    }
}
