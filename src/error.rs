// src/error.rs
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::store::StoreError;

/// Every way a poll operation can be refused. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("admin access required")]
    Unauthorized,

    #[error("poll not found")]
    NotFound,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("you have already voted on this poll")]
    AlreadyVoted,

    #[error("poll is closed")]
    PollClosed,

    #[error("poll is still open")]
    PollStillOpen,

    #[error("you must vote first to see results")]
    Forbidden,

    #[error("storage failure: {0}")]
    Storage(String),
}

impl PollError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PollError::Unauthenticated => StatusCode::UNAUTHORIZED,
            PollError::Unauthorized | PollError::Forbidden => StatusCode::FORBIDDEN,
            PollError::NotFound => StatusCode::NOT_FOUND,
            PollError::AlreadyVoted => StatusCode::CONFLICT,
            PollError::InvalidArgument(_) | PollError::PollClosed | PollError::PollStillOpen => {
                StatusCode::BAD_REQUEST
            }
            PollError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for PollError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => PollError::AlreadyVoted,
            StoreError::MissingPoll => PollError::NotFound,
            StoreError::PollClosed => PollError::PollClosed,
            StoreError::OptionOutOfRange => PollError::invalid("invalid option"),
            StoreError::OptionsInUse { highest } => PollError::InvalidArgument(format!(
                "option {highest} already has votes; cannot shrink options below {}",
                highest + 1
            )),
            StoreError::Database(e) => PollError::Storage(e.to_string()),
        }
    }
}

impl From<JsonRejection> for PollError {
    fn from(rejection: JsonRejection) -> Self {
        PollError::InvalidArgument(rejection.body_text())
    }
}

impl From<PathRejection> for PollError {
    fn from(rejection: PathRejection) -> Self {
        PollError::InvalidArgument(rejection.body_text())
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
