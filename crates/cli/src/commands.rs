//! CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use warden_core::Navigation;
use warden_http::Method;

use crate::config::{self, WardenConfig};

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and persist the returned token pair
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (prefer the environment variable over the flag)
        #[arg(short, long, env = "WARDEN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the persisted session
    Logout,

    /// Show whether a session is persisted
    Status,

    /// Send a request with the current session and print the response body
    Request {
        /// Path under the configured base URL
        path: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Check whether navigation to a view would be allowed
    Guard {
        /// View path, e.g. /main
        path: String,
    },

    /// Generate a default configuration file
    Config {
        /// Output file path
        #[arg(default_value = "warden.toml")]
        output: PathBuf,
    },
}

impl Commands {
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        match self {
            Self::Login { username, password } => {
                let config = WardenConfig::load(config_path)?;
                let client = config.session_client(config.token_store())?;
                let response = client.login(&username, &password).await?;

                println!("Logged in as {username}");
                if !response.extra.is_empty() {
                    println!("{}", serde_json::to_string_pretty(&response.extra)?);
                }
            }
            Self::Logout => {
                let config = WardenConfig::load(config_path)?;
                let client = config.session_client(config.token_store())?;
                client.logout()?;
                println!("Logged out");
            }
            Self::Status => {
                let config = WardenConfig::load(config_path)?;
                let client = config.session_client(config.token_store())?;
                println!("{} ({})", client.state()?, config.token_file().display());
            }
            Self::Request { path, method, data } => {
                let config = WardenConfig::load(config_path)?;
                let store = config.token_store();
                let client = config.session_client(store.clone())?;
                let guard = config.guard(store);
                let mut events = client.subscribe();

                let method = Method::from_bytes(method.to_uppercase().as_bytes())
                    .with_context(|| format!("Invalid HTTP method: {method}"))?;
                let mut request = client.request(method, &path);
                if let Some(data) = data {
                    let body: serde_json::Value =
                        serde_json::from_str(&data).context("--data must be valid JSON")?;
                    request = request.json(&body);
                }

                let result = client.send(request).await;

                while let Ok(event) = events.try_recv() {
                    if let Some(Navigation::Redirect(to)) = guard.on_event(&event) {
                        warn!(event = ?event, "Session ended");
                        eprintln!("Session ended, log in again ({to})");
                    }
                }

                let response = result?;
                let status = response.status();
                let body = response.text().await?;
                info!(status = %status, "Request completed");
                println!("{body}");
            }
            Self::Guard { path } => {
                let config = WardenConfig::load(config_path)?;
                let guard = config.guard(config.token_store());
                match guard.check(&path)? {
                    Navigation::Proceed(path) => println!("proceed {path}"),
                    Navigation::Redirect(to) => println!("redirect {to}"),
                }
            }
            Self::Config { output } => {
                config::generate_default_config(&output)?;
                info!("Configuration written to {}", output.display());
            }
        }

        Ok(())
    }
}
