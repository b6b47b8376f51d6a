//! File-backed token store
//!
//! Persists the pair as a small JSON document under the fixed keys
//! `accessToken` and `refreshToken`. Writes go to a sibling temporary file
//! that is renamed over the target, so readers see either the old pair or
//! the new one.

use crate::{StoreError, StoreResult, TokenPair, TokenStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const TOKEN_FILE_NAME: &str = "tokens.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedTokens {
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(rename = "refreshToken", skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// Token store persisted in a JSON file
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Default token file location inside the platform data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("warden")
            .join(TOKEN_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StoreResult<PersistedTokens> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PersistedTokens::default()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn write_atomically(&self, contents: &[u8]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = open_private(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        file.write_all(contents)
            .and_then(|()| file.sync_all())
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::io(&self.path, e)
        })
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

impl TokenStore for FileTokenStore {
    fn get_access(&self) -> StoreResult<Option<String>> {
        Ok(self.read()?.access_token)
    }

    fn get_refresh(&self) -> StoreResult<Option<String>> {
        Ok(self.read()?.refresh_token)
    }

    fn save(&self, access: &str, refresh: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let document = PersistedTokens {
            access_token: Some(access.to_string()),
            refresh_token: Some(refresh.to_string()),
        };
        let contents = serde_json::to_vec_pretty(&document).map_err(|source| {
            StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        self.write_atomically(&contents)?;
        debug!(path = %self.path.display(), "Persisted token pair");
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed token file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    // One read so both halves come from the same file version.
    fn load(&self) -> StoreResult<Option<TokenPair>> {
        let document = self.read()?;
        Ok(match (document.access_token, document.refresh_token) {
            (Some(access), Some(refresh)) => Some(TokenPair { access, refresh }),
            _ => None,
        })
    }
}
