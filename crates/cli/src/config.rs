//! CLI configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `WARDEN__` environment variables.

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use warden_core::{FileTokenStore, NavigationGuard, RouteTable, TokenStore};
use warden_http::{SessionClient, SessionConfig};

const DEFAULT_CONFIG_FILE: &str = "warden.toml";

/// Top-level CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Session client settings
    pub session: SessionConfig,

    /// Token file (defaults to the platform data directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,

    /// Navigation guard settings
    pub guard: GuardConfig,
}

/// Views the guard knows about
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Where unauthenticated navigation is sent
    pub login_path: String,

    /// Paths that require an authenticated session
    pub protected: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            protected: Vec::new(),
        }
    }
}

impl WardenConfig {
    /// Load configuration, using `path` if given or `warden.toml` in the
    /// working directory if present
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, or if any source
    /// cannot be parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&Self::default())?);

        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("WARDEN")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        Ok(config.try_deserialize()?)
    }

    pub fn token_file(&self) -> PathBuf {
        self.token_file
            .clone()
            .unwrap_or_else(FileTokenStore::default_path)
    }

    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        Arc::new(FileTokenStore::new(self.token_file()))
    }

    /// Build a session client armed from the persisted tokens
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the token file
    /// cannot be read
    pub fn session_client(&self, store: Arc<dyn TokenStore>) -> Result<SessionClient> {
        let client = SessionClient::builder()
            .config(self.session.clone())
            .store(store)
            .build()?;
        client.init_from_persisted()?;
        Ok(client)
    }

    pub fn guard(&self, store: Arc<dyn TokenStore>) -> NavigationGuard {
        let routes = self
            .guard
            .protected
            .iter()
            .fold(RouteTable::new(&self.guard.login_path), |routes, path| {
                routes.protected(path, path)
            })
            .route(&self.guard.login_path, "login");
        NavigationGuard::new(routes, store)
    }
}

/// Write the default configuration as TOML
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let content = toml::to_string_pretty(&WardenConfig::default())?;
    std::fs::write(path, content)?;
    Ok(())
}
