//! Session client error types

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use warden_core::StoreError;

/// Session client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, connection, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Login endpoint rejected the username/password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Backend violated the token contract
    #[error("Invalid server response: {0}")]
    InvalidServerResponse(String),

    /// Refreshing the access token failed; the session has ended
    #[error("Session expired: {0}")]
    SessionExpired(#[source] RefreshError),

    /// No tokens available for an operation that needs them
    #[error("Not authenticated")]
    Unauthenticated,

    /// Server returned 401 after the single refresh-and-retry cycle
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token persistence failed
    #[error("Token storage error: {0}")]
    Storage(#[from] StoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether this error ended the session, meaning the user has to log in
    /// again
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::SessionExpired(_) | Self::Unauthenticated)
    }
}

/// Outcome of a failed refresh, shared by every request waiting on it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("refresh request failed: {0}")]
    Network(String),

    #[error("refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid refresh response: {0}")]
    InvalidServerResponse(String),

    #[error("refresh timed out after {0:?}")]
    TimedOut(Duration),

    #[error("token storage failed during refresh: {0}")]
    Storage(String),

    #[error("session changed while the refresh was in flight")]
    Superseded,

    #[error("refresh task aborted")]
    Aborted,
}

impl From<StoreError> for RefreshError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}
