//! Session lifecycle events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived session state: authenticated iff an access token is present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Authenticated,
    Anonymous,
}

impl SessionState {
    pub fn from_access(access: Option<&str>) -> Self {
        if access.is_some() {
            Self::Authenticated
        } else {
            Self::Anonymous
        }
    }

    pub fn is_authenticated(self) -> bool {
        self == Self::Authenticated
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated => write!(f, "authenticated"),
            Self::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// Explicit local logout
    Logout,
    /// The refresh endpoint rejected or failed to answer the refresh token
    RefreshFailed,
    /// A request was rejected and no refresh token was available
    MissingRefreshToken,
}

/// Event broadcast by a session client to the hosting application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "reason", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    SessionEnded(SessionEndReason),
}

impl SessionEvent {
    /// Whether the user must be sent back to the login view
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::SessionEnded(_))
    }
}
