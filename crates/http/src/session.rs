//! Session client
//!
//! Wraps a `reqwest` client: attaches the armed access token to every
//! outgoing request and, when the server answers 401, refreshes the token
//! once (shared by all concurrent callers) and replays the request.

use crate::config::SessionConfig;
use crate::error::ClientError;
use crate::refresh::SharedRefresh;
use crate::types::{LoginRequest, LoginResponse, TokenResponse};
use reqwest::header::{self, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, Request, RequestBuilder, Response, StatusCode};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use warden_core::{
    MemoryTokenStore, SessionEndReason, SessionEvent, SessionState, StoreError, TokenPair,
    TokenStore,
};

const DEFAULT_USER_AGENT: &str = concat!("warden/", env!("CARGO_PKG_VERSION"));
const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Authenticated HTTP client with transparent token refresh
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) http: Client,
    pub(crate) config: SessionConfig,
    pub(crate) refresh_timeout: Duration,
    pub(crate) store: Arc<dyn TokenStore>,
    /// Access token attached to outgoing requests. Store writes happen while
    /// this lock is held.
    pub(crate) armed: Mutex<Option<String>>,
    pub(crate) pending: Mutex<Option<SharedRefresh>>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Poisoned)
}

impl Inner {
    pub(crate) fn armed_token(&self) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.armed)?.clone())
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Clear the store and disarm. `SessionEnded` is emitted when there was a
    /// session to end, or always when `announce` is set.
    pub(crate) fn end_session(
        &self,
        reason: SessionEndReason,
        announce: bool,
    ) -> Result<(), StoreError> {
        let armed = lock(&self.armed)?;
        self.end_locked(armed, reason, announce)
    }

    /// Like [`Inner::end_session`], but leaves a session alone whose refresh
    /// token is no longer `used_refresh`
    pub(crate) fn end_session_if_current(
        &self,
        reason: SessionEndReason,
        used_refresh: &str,
    ) -> Result<(), StoreError> {
        let armed = lock(&self.armed)?;
        // An unreadable store is treated as still holding the failed session.
        let current = self
            .store
            .get_refresh()
            .map_or(true, |refresh| refresh.as_deref() == Some(used_refresh));
        if !current {
            debug!("Session replaced while refreshing, keeping it");
            return Ok(());
        }
        self.end_locked(armed, reason, false)
    }

    fn end_locked(
        &self,
        mut armed: MutexGuard<'_, Option<String>>,
        reason: SessionEndReason,
        announce: bool,
    ) -> Result<(), StoreError> {
        let was_persisted = self
            .store
            .get_access()
            .map_or(true, |access| access.is_some());
        // Stay armed if the pair could not be removed.
        self.store.clear()?;
        let was_armed = armed.take().is_some();
        drop(armed);

        if was_armed || was_persisted || announce {
            info!(reason = ?reason, "Session ended");
            self.emit(SessionEvent::SessionEnded(reason));
        }
        Ok(())
    }
}

impl SessionClient {
    /// Create a client with an in-memory token store
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::default()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    /// Subscribe to session events such as `SessionEnded`
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Session state as persisted in the token store
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read
    pub fn state(&self) -> Result<SessionState, ClientError> {
        let access = self.inner.store.get_access()?;
        Ok(SessionState::from_access(access.as_deref()))
    }

    /// Access token currently attached to requests
    ///
    /// # Errors
    ///
    /// Returns an error if the client state lock is poisoned
    pub fn access_token(&self) -> Result<Option<String>, ClientError> {
        Ok(self.inner.armed_token()?)
    }

    /// Whether a token refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        lock(&self.inner.pending).is_ok_and(|pending| pending.is_some())
    }

    /// Arm the client with a persisted access token, without asking the
    /// backend whether it is still valid
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read
    pub fn init_from_persisted(&self) -> Result<SessionState, ClientError> {
        let access = self.inner.store.get_access()?;
        let state = SessionState::from_access(access.as_deref());
        *lock(&self.inner.armed)? = access;
        debug!(state = %state, "Initialized from persisted tokens");
        Ok(state)
    }

    /// Log in with username and password, persisting the returned token pair
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` if the endpoint rejects the credentials,
    /// `InvalidServerResponse` if either token is missing from the response,
    /// and network or storage errors otherwise. Nothing is persisted on
    /// failure.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let response = self
            .inner
            .http
            .post(self.inner.config.login_url())
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            warn!(username, status = %status, "Login rejected");
            return Err(ClientError::InvalidCredentials(message));
        }

        let response = check_status(response).await?;
        let body: TokenResponse = response.json().await.map_err(|e| {
            ClientError::InvalidServerResponse(format!("login response is not valid JSON: {e}"))
        })?;
        let (Some(access), Some(refresh)) = (body.access(), body.refresh()) else {
            return Err(ClientError::InvalidServerResponse(
                "login response is missing the access or refresh token".to_string(),
            ));
        };
        let tokens = TokenPair::new(access, refresh);

        {
            let mut armed = lock(&self.inner.armed)?;
            self.inner.store.save(&tokens.access, &tokens.refresh)?;
            *armed = Some(tokens.access.clone());
        }

        info!(username, "Logged in");
        self.inner.emit(SessionEvent::LoggedIn);

        Ok(LoginResponse {
            tokens,
            extra: body.extra,
        })
    }

    /// Forget the session locally and emit `SessionEnded`
    ///
    /// # Errors
    ///
    /// Returns an error only if the token store cannot be cleared
    pub fn logout(&self) -> Result<(), ClientError> {
        self.inner.end_session(SessionEndReason::Logout, true)?;
        Ok(())
    }

    /// Create a request builder for a path under the base URL
    ///
    /// Authentication is attached by [`SessionClient::send`].
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner
            .http
            .request(method, self.inner.config.endpoint(path))
    }

    /// Send a request with the current access token
    ///
    /// On a 401 the token is refreshed (or an in-flight refresh is awaited)
    /// and the request is replayed once with the new token.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures, non-2xx statuses, a second
    /// 401 after the retry, or when the session cannot be recovered
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let mut request = request.build()?;
        let replay = request.try_clone();
        let sent_with = self.inner.armed_token()?;
        if let Some(token) = sent_with.as_deref() {
            set_bearer(&mut request, token)?;
        }

        let response = self.inner.http.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        debug!(url = %response.url(), "Request rejected with 401, recovering session");
        let token = self.inner.recover(sent_with.as_deref()).await?;

        let Some(mut retry) = replay else {
            warn!("Request body cannot be replayed, not retrying");
            return Err(ClientError::AuthenticationFailed(
                "request body cannot be replayed after refresh".to_string(),
            ));
        };
        set_bearer(&mut retry, &token)?;

        let response = self.inner.http.execute(retry).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "Request rejected again after refresh");
        }
        check_status(response).await
    }

    /// Send a request and decode a JSON response
    ///
    /// # Errors
    ///
    /// Returns the errors of [`SessionClient::send`], or a decoding error
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }
}

fn set_bearer(request: &mut Request, token: &str) -> Result<(), ClientError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        ClientError::InvalidServerResponse("access token is not a valid header value".to_string())
    })?;
    value.set_sensitive(true);
    request.headers_mut().insert(header::AUTHORIZATION, value);
    Ok(())
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(ClientError::from_status(status, message))
    }
}

/// Builder for SessionClient
#[derive(Default)]
pub struct SessionClientBuilder {
    base_url: Option<String>,
    config: SessionConfig,
    store: Option<Arc<dyn TokenStore>>,
    timeout: Option<Duration>,
    refresh_timeout: Option<Duration>,
    event_capacity: Option<usize>,
}

impl SessionClientBuilder {
    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Start from a full configuration, including its base URL
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.base_url = Some(config.base_url.clone());
        self.config = config;
        self
    }

    /// Set the token store (in-memory by default)
    #[must_use]
    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.config.login_path = path.into();
        self
    }

    #[must_use]
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.refresh_path = path.into();
        self
    }

    /// Set the timeout for ordinary requests
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the timeout for the refresh call
    #[must_use]
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Whether to store a refresh token re-issued by the refresh endpoint
    #[must_use]
    pub const fn accept_rotated_refresh(mut self, accept: bool) -> Self {
        self.config.accept_rotated_refresh = accept;
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(agent.into());
        self
    }

    /// Capacity of the session event channel
    #[must_use]
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or invalid, or the HTTP
    /// client cannot be built
    pub fn build(self) -> Result<SessionClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        url::Url::parse(&base_url).map_err(|e| {
            ClientError::Configuration(format!("invalid base_url {base_url}: {e}"))
        })?;

        let mut config = self.config;
        config.base_url = base_url.trim_end_matches('/').to_string();

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let mut client_builder = ClientBuilder::new().user_agent(user_agent);
        if let Some(timeout) = self.timeout.or_else(|| config.timeout()) {
            client_builder = client_builder.timeout(timeout);
        }
        let http = client_builder.build()?;

        let refresh_timeout = self
            .refresh_timeout
            .unwrap_or_else(|| config.refresh_timeout());
        if refresh_timeout.is_zero() {
            return Err(ClientError::Configuration(
                "refresh timeout must be greater than zero".into(),
            ));
        }
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let (events, _) =
            broadcast::channel(self.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY).max(1));

        Ok(SessionClient {
            inner: Arc::new(Inner {
                http,
                config,
                refresh_timeout,
                store,
                armed: Mutex::new(None),
                pending: Mutex::new(None),
                events,
            }),
        })
    }
}
