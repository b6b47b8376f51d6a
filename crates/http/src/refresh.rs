//! Single-flight token refresh
//!
//! At most one refresh call is in flight per client. Requests that hit a 401
//! while it runs await the same shared outcome. The call itself runs on a
//! spawned task, so a caller that gives up only drops its own wait.

use crate::error::{ClientError, RefreshError};
use crate::session::{Inner, lock};
use crate::types::{RefreshRequest, TokenResponse};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tracing::{debug, info, warn};
use warden_core::{SessionEndReason, SessionEvent, TokenPair};

pub(crate) type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Empties the pending slot once the refresh task finishes, even if it panics
struct ClearPending(Arc<Inner>);

impl Drop for ClearPending {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.0.pending.lock() {
            *pending = None;
        }
    }
}

impl Inner {
    /// Produce a usable access token after a request sent with `stale` was
    /// rejected with 401
    pub(crate) async fn recover(
        self: &Arc<Self>,
        stale: Option<&str>,
    ) -> Result<String, ClientError> {
        // Read before taking the pending lock; the store may do file IO.
        let refresh_token = self.store.get_refresh()?;

        let refresh = {
            let mut pending = lock(&self.pending)?;
            if let Some(in_flight) = pending.as_ref() {
                debug!("Joining in-flight token refresh");
                in_flight.clone()
            } else {
                // A refresh that settled after this request was sent already
                // replaced the token.
                if let Some(current) = self.armed_token()?
                    && Some(current.as_str()) != stale
                {
                    debug!("Access token already replaced, retrying without refresh");
                    return Ok(current);
                }

                let Some(refresh_token) = refresh_token else {
                    drop(pending);
                    warn!("Request rejected and no refresh token available");
                    // A request sent with a token whose session is already
                    // gone has been announced by whoever ended it.
                    self.end_session(SessionEndReason::MissingRefreshToken, stale.is_none())?;
                    return Err(ClientError::Unauthenticated);
                };

                let started = self.spawn_refresh(refresh_token);
                *pending = Some(started.clone());
                started
            }
        };

        refresh.await.map_err(ClientError::SessionExpired)
    }

    fn spawn_refresh(self: &Arc<Self>, refresh_token: String) -> SharedRefresh {
        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            let _clear = ClearPending(Arc::clone(&inner));
            let outcome = inner.refresh_with_timeout(&refresh_token).await;
            inner.settle(&refresh_token, outcome)
        });

        async move { task.await.unwrap_or(Err(RefreshError::Aborted)) }
            .boxed()
            .shared()
    }

    async fn refresh_with_timeout(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        info!("Refreshing access token");
        tokio::time::timeout(self.refresh_timeout, self.request_refresh(refresh_token))
            .await
            .map_err(|_| RefreshError::TimedOut(self.refresh_timeout))?
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let response = self
            .http
            .post(self.config.refresh_url())
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidServerResponse(e.to_string()))?;
        let access = body.access().ok_or_else(|| {
            RefreshError::InvalidServerResponse(
                "refresh response carried no access token".to_string(),
            )
        })?;
        let refresh = match body.refresh() {
            Some(rotated) if self.config.accept_rotated_refresh => rotated,
            _ => refresh_token,
        };

        Ok(TokenPair::new(access, refresh))
    }

    fn settle(
        &self,
        used_refresh: &str,
        outcome: Result<TokenPair, RefreshError>,
    ) -> Result<String, RefreshError> {
        let error = match outcome.and_then(|tokens| self.store_refreshed(used_refresh, tokens)) {
            Ok(access) => return Ok(access),
            Err(RefreshError::Superseded) => return Err(RefreshError::Superseded),
            Err(error) => error,
        };

        warn!(error = %error, "Token refresh failed");
        if let Err(store_error) =
            self.end_session_if_current(SessionEndReason::RefreshFailed, used_refresh)
        {
            warn!(error = %store_error, "Failed to clear tokens after refresh failure");
        }
        Err(error)
    }

    fn store_refreshed(&self, used_refresh: &str, tokens: TokenPair) -> Result<String, RefreshError> {
        let mut armed = lock(&self.armed)?;
        if self.store.get_refresh()?.as_deref() != Some(used_refresh) {
            warn!("Session changed while refreshing, discarding refreshed tokens");
            return armed.clone().ok_or(RefreshError::Superseded);
        }

        self.store.save(&tokens.access, &tokens.refresh)?;
        *armed = Some(tokens.access.clone());
        drop(armed);

        info!("Access token refreshed");
        self.emit(SessionEvent::Refreshed);
        Ok(tokens.access)
    }
}
