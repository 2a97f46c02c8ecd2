//! Error types for renewal coordination

/// Why a fresh access token could not be obtained.
///
/// Cloneable: one failed exchange is delivered to every queued waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh token rejected: {0}")]
    Rejected(String),

    #[error("token refresh failed: {0}")]
    Exchange(String),

    #[error("refresh coordinator stopped")]
    CoordinatorClosed,
}

impl From<session_auth::Error> for RefreshError {
    fn from(err: session_auth::Error) -> Self {
        match err {
            session_auth::Error::InvalidCredentials(msg) => RefreshError::Rejected(msg),
            other => RefreshError::Exchange(other.to_string()),
        }
    }
}

/// Result alias for coordinator operations.
pub type Result<T> = std::result::Result<T, RefreshError>;
