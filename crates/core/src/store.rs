//! Token persistence
//!
//! A [`TokenStore`] exclusively owns the persisted [`TokenPair`]. Session
//! clients only read and write through this interface.

use crate::{StoreError, StoreResult, TokenPair};
use std::sync::RwLock;

pub trait TokenStore: Send + Sync {
    /// Current access token, if a session is persisted
    fn get_access(&self) -> StoreResult<Option<String>>;

    /// Current refresh token, if a session is persisted
    fn get_refresh(&self) -> StoreResult<Option<String>>;

    /// Replace both tokens. Either both are written or the store is left
    /// unchanged.
    fn save(&self, access: &str, refresh: &str) -> StoreResult<()>;

    /// Remove both tokens
    fn clear(&self) -> StoreResult<()>;

    /// Load the full pair, if both halves are present
    fn load(&self) -> StoreResult<Option<TokenPair>> {
        Ok(match (self.get_access()?, self.get_refresh()?) {
            (Some(access), Some(refresh)) => Some(TokenPair { access, refresh }),
            _ => None,
        })
    }

    /// Whether an access token is currently persisted
    fn is_authenticated(&self) -> StoreResult<bool> {
        Ok(self.get_access()?.is_some())
    }
}

/// In-process token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    pair: RwLock<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a session
    pub fn with_tokens(pair: TokenPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_access(&self) -> StoreResult<Option<String>> {
        let pair = self.pair.read().map_err(|_| StoreError::Poisoned)?;
        Ok(pair.as_ref().map(|p| p.access.clone()))
    }

    fn get_refresh(&self) -> StoreResult<Option<String>> {
        let pair = self.pair.read().map_err(|_| StoreError::Poisoned)?;
        Ok(pair.as_ref().map(|p| p.refresh.clone()))
    }

    fn save(&self, access: &str, refresh: &str) -> StoreResult<()> {
        let mut pair = self.pair.write().map_err(|_| StoreError::Poisoned)?;
        *pair = Some(TokenPair::new(access, refresh));
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut pair = self.pair.write().map_err(|_| StoreError::Poisoned)?;
        *pair = None;
        Ok(())
    }

    fn load(&self) -> StoreResult<Option<TokenPair>> {
        let pair = self.pair.read().map_err(|_| StoreError::Poisoned)?;
        Ok(pair.clone())
    }
}

// Mock implementation for testing
#[cfg(any(test, feature = "tests"))]
pub mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        pub TokenStore {}

        impl TokenStore for TokenStore {
            fn get_access(&self) -> StoreResult<Option<String>>;
            fn get_refresh(&self) -> StoreResult<Option<String>>;
            fn save(&self, access: &str, refresh: &str) -> StoreResult<()>;
            fn clear(&self) -> StoreResult<()>;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get_access().unwrap(), None);
        assert!(!store.is_authenticated().unwrap());

        store.save("A1", "R1").unwrap();
        assert_eq!(store.get_access().unwrap().as_deref(), Some("A1"));
        assert_eq!(store.get_refresh().unwrap().as_deref(), Some("R1"));
        assert!(store.is_authenticated().unwrap());

        store.clear().unwrap();
        assert_eq!(store.get_access().unwrap(), None);
        assert_eq!(store.get_refresh().unwrap(), None);
    }

    #[test]
    fn test_save_overwrites_both_fields() {
        let store = MemoryTokenStore::with_tokens(TokenPair::new("A1", "R1"));
        store.save("A2", "R2").unwrap();
        assert_eq!(store.load().unwrap(), Some(TokenPair::new("A2", "R2")));
    }

    #[test]
    fn test_load_requires_both_halves() {
        let mut store = mock::MockTokenStore::new();
        store
            .expect_get_access()
            .returning(|| Ok(Some("A1".to_string())));
        store.expect_get_refresh().returning(|| Ok(None));

        assert!(store.is_authenticated().unwrap());
        assert_eq!(store.load().unwrap(), None);
    }
}
