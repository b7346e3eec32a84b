//! Centralized error hierarchy for the playback core.
//!
//! Every fallible operation in this crate returns `Result<T>` (this module's
//! alias). `AppError` implements `IntoResponse` so handlers can simply use
//! `?` and let axum turn the error into the JSON envelope callers expect.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppError {
    /// Upstream has no record of the referenced media id.
    MediaNotFound { media_id: String },
    /// Upstream record is missing codec/container/resolution facts the
    /// planner needs to make a decision.
    MediaUnknown { media_id: String },
    /// No provider supports the request, or all matching providers are at
    /// capacity.
    NoProvider { reason: String },
    /// A provider adapter refused or crashed while starting a session.
    ProviderStart { message: String },
    SessionNotFound { session_id: String },
    /// Stop was called on an already-terminal session; callers should treat
    /// this as a successful no-op, not bubble it up as an HTTP error.
    SessionTerminal { session_id: String },
    SegmentNotFound { session_id: String, filename: String },
    PathTraversal { filename: String },
    DiskFull { message: String },
    Validation(String),
    Config(String),
    Io(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MediaNotFound { media_id } => write!(f, "media not found: {media_id}"),
            AppError::MediaUnknown { media_id } => {
                write!(f, "media facts incomplete for: {media_id}")
            }
            AppError::NoProvider { reason } => write!(f, "no provider available: {reason}"),
            AppError::ProviderStart { message } => write!(f, "provider failed to start: {message}"),
            AppError::SessionNotFound { session_id } => {
                write!(f, "session not found: {session_id}")
            }
            AppError::SessionTerminal { session_id } => {
                write!(f, "session already terminal: {session_id}")
            }
            AppError::SegmentNotFound { session_id, filename } => {
                write!(f, "segment not found: {session_id}/{filename}")
            }
            AppError::PathTraversal { filename } => {
                write!(f, "path traversal attempt rejected: {filename}")
            }
            AppError::DiskFull { message } => write!(f, "disk budget exceeded: {message}"),
            AppError::Validation(message) => write!(f, "validation error: {message}"),
            AppError::Config(message) => write!(f, "configuration error: {message}"),
            AppError::Io(message) => write!(f, "io error: {message}"),
            AppError::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// `SessionTerminal` maps to 200 — the caller should render it as a
    /// no-op success, not surface it as an error body; handlers check for
    /// that variant explicitly before falling through to `into_response`.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MediaNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::MediaUnknown { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NoProvider { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ProviderStart { .. } => StatusCode::BAD_GATEWAY,
            AppError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::SessionTerminal { .. } => StatusCode::OK,
            AppError::SegmentNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::PathTraversal { .. } => StatusCode::BAD_REQUEST,
            AppError::DiskFull { .. } => StatusCode::INSUFFICIENT_STORAGE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::Validation(err.to_string())
    }
}
