//! Error types for the hypo client.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a backend request did not produce a usable response.
///
/// Every variant is recoverable by the caller. The client itself never
/// retries or backs off.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// No response arrived before the configured request timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The request was cancelled mid-flight.
    #[error("request aborted")]
    Aborted,

    /// The backend answered with a non-2xx status or an unreadable body.
    #[error("http error: {0}")]
    HttpError(String),
}

/// Errors returned by client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend request failed.
    #[error("request failed: {0}")]
    Failure(#[from] FailureKind),

    /// The request could not be constructed (bad base URL, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No project id has been configured via `init`.
    #[error("project id is not configured")]
    MissingProject,
}

impl Error {
    /// The transport failure behind this error, if any.
    pub fn failure_kind(&self) -> Option<&FailureKind> {
        match self {
            Self::Failure(kind) => Some(kind),
            _ => None,
        }
    }

    /// Whether a retry by the caller could succeed.
    ///
    /// Configuration and construction errors will fail the same way again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}
