//! Wire types for the login and refresh endpoints

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use warden_core::TokenPair;

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Token-bearing response body, as sent by both endpoints
///
/// Fields are optional on the wire; the client decides which ones the
/// contract requires.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenResponse {
    pub fn access(&self) -> Option<&str> {
        self.access.as_deref().filter(|token| !token.is_empty())
    }

    pub fn refresh(&self) -> Option<&str> {
        self.refresh.as_deref().filter(|token| !token.is_empty())
    }
}

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginResponse {
    /// The persisted token pair
    pub tokens: TokenPair,
    /// Any other fields the login endpoint returned
    pub extra: Map<String, Value>,
}
