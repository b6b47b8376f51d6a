//! Navigation guard for protected views
//!
//! The guard only checks whether an access token is currently persisted. It
//! never validates the token against the backend; an expired token is caught
//! by the session client on the first protected request.

use crate::{SessionEvent, StoreResult, TokenStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A navigable view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub requires_auth: bool,
}

/// Outcome of a navigation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Enter the requested view
    Proceed(String),
    /// Go to another view instead
    Redirect(String),
}

/// Routes known to the guard, plus static redirects
#[derive(Debug, Clone)]
pub struct RouteTable {
    login_path: String,
    routes: HashMap<String, Route>,
    redirects: HashMap<String, String>,
}

impl RouteTable {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: normalize(&login_path.into()),
            routes: HashMap::new(),
            redirects: HashMap::new(),
        }
    }

    /// Register a public route
    #[must_use]
    pub fn route(self, path: &str, name: &str) -> Self {
        self.with_route(path, name, false)
    }

    /// Register a route that requires an authenticated session
    #[must_use]
    pub fn protected(self, path: &str, name: &str) -> Self {
        self.with_route(path, name, true)
    }

    /// Register a static redirect, e.g. `/` to `/login`
    #[must_use]
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(normalize(from), normalize(to));
        self
    }

    fn with_route(mut self, path: &str, name: &str, requires_auth: bool) -> Self {
        let path = normalize(path);
        self.routes.insert(
            path.clone(),
            Route {
                path,
                name: name.to_string(),
                requires_auth,
            },
        );
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.get(&normalize(path))
    }

    pub fn redirect_for(&self, path: &str) -> Option<&str> {
        self.redirects.get(&normalize(path)).map(String::as_str)
    }

    pub fn requires_auth(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(|route| route.requires_auth)
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Gate in front of views marked as requiring authentication
#[derive(Clone)]
pub struct NavigationGuard {
    routes: RouteTable,
    store: Arc<dyn TokenStore>,
}

impl NavigationGuard {
    pub fn new(routes: RouteTable, store: Arc<dyn TokenStore>) -> Self {
        Self { routes, store }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide whether navigation to `path` may proceed
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read
    pub fn check(&self, path: &str) -> StoreResult<Navigation> {
        if let Some(target) = self.routes.redirect_for(path) {
            return Ok(Navigation::Redirect(target.to_string()));
        }

        let path = normalize(path);
        if !self.routes.requires_auth(&path) {
            return Ok(Navigation::Proceed(path));
        }

        if self.store.get_access()?.is_some() {
            Ok(Navigation::Proceed(path))
        } else {
            debug!(path = %path, "No access token, redirecting to login");
            Ok(Navigation::Redirect(self.routes.login_path().to_string()))
        }
    }

    /// Where to go in reaction to a session event, if anywhere
    pub fn on_event(&self, event: &SessionEvent) -> Option<Navigation> {
        event
            .requires_login()
            .then(|| Navigation::Redirect(self.routes.login_path().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryTokenStore, SessionEndReason};

    fn table() -> RouteTable {
        RouteTable::new("/login")
            .redirect("/", "/login")
            .route("/login", "LoginPage")
            .route("/register", "RegisterPage")
            .protected("/main", "MainPage")
            .protected("/device-list", "DeviceList")
    }

    #[test]
    fn test_public_route_always_proceeds() {
        let guard = NavigationGuard::new(table(), Arc::new(MemoryTokenStore::new()));
        assert_eq!(
            guard.check("/register").unwrap(),
            Navigation::Proceed("/register".to_string())
        );
    }

    #[test]
    fn test_protected_route_redirects_without_token() {
        let guard = NavigationGuard::new(table(), Arc::new(MemoryTokenStore::new()));
        assert_eq!(
            guard.check("/main/").unwrap(),
            Navigation::Redirect("/login".to_string())
        );
    }

    #[test]
    fn test_protected_route_proceeds_with_token() {
        let store = Arc::new(MemoryTokenStore::new());
        store.save("A1", "R1").unwrap();
        let guard = NavigationGuard::new(table(), store.clone());

        assert_eq!(
            guard.check("device-list").unwrap(),
            Navigation::Proceed("/device-list".to_string())
        );

        store.clear().unwrap();
        assert_eq!(
            guard.check("/device-list").unwrap(),
            Navigation::Redirect("/login".to_string())
        );
    }

    #[test]
    fn test_static_redirect() {
        let guard = NavigationGuard::new(table(), Arc::new(MemoryTokenStore::new()));
        assert_eq!(
            guard.check("/").unwrap(),
            Navigation::Redirect("/login".to_string())
        );
    }

    #[test]
    fn test_unknown_route_is_not_protected() {
        let guard = NavigationGuard::new(table(), Arc::new(MemoryTokenStore::new()));
        assert_eq!(
            guard.check("/elsewhere").unwrap(),
            Navigation::Proceed("/elsewhere".to_string())
        );
    }

    #[test]
    fn test_session_ended_sends_to_login() {
        let guard = NavigationGuard::new(table(), Arc::new(MemoryTokenStore::new()));
        assert_eq!(
            guard.on_event(&SessionEvent::SessionEnded(SessionEndReason::RefreshFailed)),
            Some(Navigation::Redirect("/login".to_string()))
        );
        assert_eq!(guard.on_event(&SessionEvent::Refreshed), None);
    }
}
