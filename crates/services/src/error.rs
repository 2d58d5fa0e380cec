//! Shared error types for the services crate.

use thiserror::Error;

use spark_core::error::{Classify, ErrorCode};
use spark_core::model::{ProgressError, ProjectError, ProjectId};
use storage::repository::StoreError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressTracker`.
///
/// Validation failures and missing projects are surfaced as-is, never
/// retried; only storage errors pass through the retry policy first.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackerError {
    #[error("project {0} not found")]
    NotFound(ProjectId),
    #[error(transparent)]
    Validation(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Errors emitted by `ProjectService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProjectServiceError {
    #[error("project {0} not found")]
    NotFound(ProjectId),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Errors emitted by the AI client and project generator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AiError {
    #[error("ai generation is not configured")]
    Disabled,
    #[error("ai endpoint returned an empty response")]
    EmptyResponse,
    #[error("ai endpoint returned malformed output: {0}")]
    MalformedResponse(String),
    #[error("ai request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Classify for AiError {
    fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::HttpStatus(status) => Some(code_for_status(*status)),
            Self::Http(e) => {
                if e.is_timeout() {
                    Some(ErrorCode::DeadlineExceeded)
                } else if e.is_connect() || e.is_request() {
                    Some(ErrorCode::Unavailable)
                } else {
                    None
                }
            }
            // malformed output is recoverable by regenerating, not by
            // blindly retrying the same call
            Self::Disabled | Self::EmptyResponse | Self::MalformedResponse(_) => None,
        }
    }
}

fn code_for_status(status: reqwest::StatusCode) -> ErrorCode {
    match status.as_u16() {
        401 => ErrorCode::Unauthenticated,
        403 => ErrorCode::PermissionDenied,
        404 => ErrorCode::NotFound,
        408 | 504 => ErrorCode::DeadlineExceeded,
        429 => ErrorCode::ResourceExhausted,
        499 => ErrorCode::Cancelled,
        502 | 503 => ErrorCode::Unavailable,
        code if (500..600).contains(&code) => ErrorCode::Internal,
        _ => ErrorCode::InvalidArgument,
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}
