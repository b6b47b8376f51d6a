//! Session client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL the endpoint paths are appended to
    pub base_url: String,

    /// Login endpoint path
    pub login_path: String,

    /// Token refresh endpoint path
    pub refresh_path: String,

    /// Timeout for ordinary requests in seconds (none when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Timeout for the refresh call in seconds
    pub refresh_timeout_secs: u64,

    /// Store a refresh token re-issued by the refresh endpoint. When false
    /// the original refresh token is always carried forward.
    pub accept_rotated_refresh: bool,

    /// User agent sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            login_path: "/login/".to_string(),
            refresh_path: "/token/refresh/".to_string(),
            timeout_secs: None,
            refresh_timeout_secs: 10,
            accept_rotated_refresh: true,
            user_agent: None,
        }
    }
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Full URL for an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn login_url(&self) -> String {
        self.endpoint(&self.login_path)
    }

    pub fn refresh_url(&self) -> String {
        self.endpoint(&self.refresh_path)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let config = SessionConfig::new("http://localhost:8000/api/");
        assert_eq!(config.login_url(), "http://localhost:8000/api/login/");
        assert_eq!(
            config.refresh_url(),
            "http://localhost:8000/api/token/refresh/"
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"base_url": "https://example.com"}"#).unwrap();
        assert_eq!(config.refresh_path, "/token/refresh/");
        assert_eq!(config.refresh_timeout(), Duration::from_secs(10));
        assert!(config.accept_rotated_refresh);
        assert_eq!(config.timeout(), None);
    }
}
