// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the state, loop, and HTTP layers.

use std::fmt;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Errors surfaced by the [`crate::state`] backends.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("could not acquire claim for loop {0}")]
    ClaimUnavailable(String),
    #[error("backend unreachable: {0}")]
    Backend(String),
    #[error("failed to (de)serialize value: {0}")]
    Codec(String),
}

/// Errors a handler can observe from [`crate::r#loop::context::LoopContext`].
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("timeout waiting for event {0}")]
    EventTimeout(String),
    #[error("loop was stopped")]
    LoopStopped,
    #[error("loop was paused")]
    LoopPaused,
    #[error("timeout must be greater than 0")]
    InvalidTimeout,
    #[error(transparent)]
    State(#[from] StateError),
    #[error("sleep is not implemented")]
    NotImplemented,
}

/// Unified error codes shared across the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Validation,
    UnknownEventType,
    WrongStartEvent,
    LoopStopped,
    ClaimUnavailable,
    NotFound,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation | Self::UnknownEventType | Self::WrongStartEvent | Self::LoopStopped => {
                StatusCode::BAD_REQUEST
            }
            Self::ClaimUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::UnknownEventType => "UNKNOWN_EVENT_TYPE",
            Self::WrongStartEvent => "WRONG_START_EVENT",
            Self::LoopStopped => "LOOP_STOPPED",
            Self::ClaimUnavailable => "CLAIM_UNAVAILABLE",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope returned from the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub field_errors: Vec<String>,
}

/// Error surfaced by the HTTP dispatcher, carrying a machine-readable code.
#[derive(Debug)]
pub struct FastloopError {
    pub code: ErrorCode,
    pub message: String,
    pub field_errors: Vec<String>,
}

impl FastloopError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), field_errors: Vec::new() }
    }

    pub fn with_field_errors(mut self, field_errors: Vec<String>) -> Self {
        self.field_errors = field_errors;
        self
    }
}

impl fmt::Display for FastloopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for FastloopError {}

impl From<StateError> for FastloopError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::ClaimUnavailable(loop_id) => Self::new(
                ErrorCode::ClaimUnavailable,
                format!("could not acquire claim for loop {loop_id}"),
            ),
            StateError::Backend(msg) => Self::new(ErrorCode::Internal, msg),
            StateError::Codec(msg) => Self::new(ErrorCode::Internal, msg),
        }
    }
}

impl IntoResponse for FastloopError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code.as_str().to_owned(),
                message: self.message,
                field_errors: self.field_errors,
            },
        };
        (self.code.http_status(), Json(body)).into_response()
    }
}
