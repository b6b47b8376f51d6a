//! Token storage errors

use std::path::PathBuf;
use thiserror::Error;

/// Standard result type for token store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures of the persistence medium behind a [`crate::TokenStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt token file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Token store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Create an IO error for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
