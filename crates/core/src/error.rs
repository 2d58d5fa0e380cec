//! Error classification shared across crates.
//!
//! External services (the document store, the AI endpoint) fail with a
//! classifiable code. Boundary error types populate the code where the call
//! is made, so retry decisions never pattern-match raw messages ad hoc at
//! each catch site.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::model::ProgressError;

/// Classification code carried by boundary errors.
///
/// Mirrors the status taxonomy of the hosted document store. Retryability is
/// a property of the code, not of the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    PermissionDenied,
    Unauthenticated,
    InvalidArgument,
    NotFound,
    Unavailable,
    DeadlineExceeded,
    ResourceExhausted,
    Internal,
    Cancelled,
}

impl ErrorCode {
    /// Whether an operation failing with this code is worth retrying.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        match self {
            Self::Unavailable
            | Self::DeadlineExceeded
            | Self::ResourceExhausted
            | Self::Internal
            | Self::Cancelled => true,
            Self::PermissionDenied
            | Self::Unauthenticated
            | Self::InvalidArgument
            | Self::NotFound => false,
        }
    }

    /// Wire form of the code (kebab-case, as the document store reports it).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidArgument => "invalid-argument",
            Self::NotFound => "not-found",
            Self::Unavailable => "unavailable",
            Self::DeadlineExceeded => "deadline-exceeded",
            Self::ResourceExhausted => "resource-exhausted",
            Self::Internal => "internal",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing an unknown code string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown error code: {0}")]
pub struct UnknownErrorCode(String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permission-denied" => Ok(Self::PermissionDenied),
            "unauthenticated" => Ok(Self::Unauthenticated),
            "invalid-argument" => Ok(Self::InvalidArgument),
            "not-found" => Ok(Self::NotFound),
            "unavailable" => Ok(Self::Unavailable),
            "deadline-exceeded" => Ok(Self::DeadlineExceeded),
            "resource-exhausted" => Ok(Self::ResourceExhausted),
            "internal" => Ok(Self::Internal),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownErrorCode(other.to_owned())),
        }
    }
}

/// Implemented by boundary error types that may carry a classification code.
///
/// Returning `None` means the error has no code and classification falls
/// back to message inspection (and, failing that, to non-retryable).
pub trait Classify {
    fn error_code(&self) -> Option<ErrorCode>;
}

/// Top-level domain error for the core crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_codes() {
        assert!(ErrorCode::Unavailable.is_retryable());
        assert!(ErrorCode::DeadlineExceeded.is_retryable());
        assert!(ErrorCode::ResourceExhausted.is_retryable());
        assert!(ErrorCode::Internal.is_retryable());
        assert!(ErrorCode::Cancelled.is_retryable());
    }

    #[test]
    fn non_retryable_codes() {
        assert!(!ErrorCode::PermissionDenied.is_retryable());
        assert!(!ErrorCode::Unauthenticated.is_retryable());
        assert!(!ErrorCode::InvalidArgument.is_retryable());
        assert!(!ErrorCode::NotFound.is_retryable());
    }

    #[test]
    fn code_roundtrip() {
        for code in [
            ErrorCode::PermissionDenied,
            ErrorCode::Unauthenticated,
            ErrorCode::InvalidArgument,
            ErrorCode::NotFound,
            ErrorCode::Unavailable,
            ErrorCode::DeadlineExceeded,
            ErrorCode::ResourceExhausted,
            ErrorCode::Internal,
            ErrorCode::Cancelled,
        ] {
            let parsed: ErrorCode = code.as_str().parse().unwrap();
            assert_eq!(parsed, code);
        }
    }

    #[test]
    fn unknown_code_is_an_error() {
        assert!("weird-unknown".parse::<ErrorCode>().is_err());
    }
}
