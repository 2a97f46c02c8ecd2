//! Errors surfaced to callers of the pipeline

use keycase::Value;
use session_refresh::RefreshError;
use transport::TransportError;

/// Caller-visible failure classes. A recoverable 401 (auth expired) is
/// handled inside the pipeline and never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The session is gone; re-authentication is required.
    AuthFatal,
    /// Any other network or HTTP failure, passed through without retry.
    Transport,
}

/// Errors from `ApiClient`. Response bodies are already in camelCase.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("request failed with status {status}")]
    Status { status: u16, body: Value },

    #[error("authentication rejected by auth endpoint ({status}), session ended")]
    AuthFatal { status: u16, body: Value },

    #[error("session could not be renewed: {source}")]
    Refresh {
        source: RefreshError,
        status: u16,
        body: Value,
    },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("credential storage failed: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::AuthFatal { .. } | ApiError::Refresh { .. } => ErrorKind::AuthFatal,
            _ => ErrorKind::Transport,
        }
    }

    /// HTTP status of the failed response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. }
            | ApiError::AuthFatal { status, .. }
            | ApiError::Refresh { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Error body of the failed response, in camelCase.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiError::Status { body, .. }
            | ApiError::AuthFatal { body, .. }
            | ApiError::Refresh { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ApiError>;
