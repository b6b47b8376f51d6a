//! Warden HTTP session client
//!
//! Attaches bearer tokens to outgoing requests and transparently refreshes
//! them on 401, with at most one refresh in flight at a time.

pub mod config;
pub mod error;
mod refresh;
pub mod session;
pub mod types;

pub use config::SessionConfig;
pub use error::{ClientError, RefreshError};
pub use reqwest::Method;
pub use session::{SessionClient, SessionClientBuilder};
pub use types::LoginResponse;
pub use warden_core::{SessionEndReason, SessionEvent, SessionState, TokenPair, TokenStore};
