//! Warden core types: token persistence, session events and the navigation guard

pub mod error;
pub mod event;
pub mod file_store;
pub mod guard;
pub mod store;
pub mod token;

pub use error::{StoreError, StoreResult};
pub use event::{SessionEndReason, SessionEvent, SessionState};
pub use file_store::FileTokenStore;
pub use guard::{Navigation, NavigationGuard, Route, RouteTable};
pub use store::{MemoryTokenStore, TokenStore};
pub use token::TokenPair;
