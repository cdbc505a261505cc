//! Auth-session context for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Used by the route guard and user-aware page commands. Holds the displayed
//! record `{ loading, is_authenticated, username }` and owns the one
//! fetch-and-cache policy for the remote "who am I" check.
//!
//! DESIGN
//! ======
//! A successful check is reused for `ttl` (zero disables reuse) so a burst of
//! guarded navigations costs one request, while an expired server session is
//! still noticed within seconds. Failed checks are never cached.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::net::types::{ApiError, AuthApi, AuthStatus};

/// Snapshot of the auth record shown to components.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    pub loading: bool,
    pub is_authenticated: bool,
    pub username: Option<String>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { loading: true, is_authenticated: false, username: None }
    }
}

impl AuthState {
    fn apply(&mut self, status: &AuthStatus) {
        self.is_authenticated = status.is_authenticated;
        self.username = if status.is_authenticated { status.username.clone() } else { None };
    }

    fn reset(&mut self) {
        self.is_authenticated = false;
        self.username = None;
    }
}

#[derive(Default)]
struct Inner {
    state: AuthState,
    fetched_at: Option<Instant>,
}

pub struct AuthContext {
    api: Arc<dyn AuthApi>,
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl AuthContext {
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, ttl: Duration) -> Self {
        Self { api, ttl, inner: Mutex::new(Inner::default()) }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.lock().state.clone()
    }

    /// Fetch the auth status once and publish it.
    ///
    /// Any failure resets the record to signed-out. `loading` is cleared on
    /// every exit path, including when this future is dropped mid-request.
    pub async fn init(&self) -> AuthState {
        self.try_init().await.unwrap_or_else(|_| self.snapshot())
    }

    /// Same as [`Self::init`], but also hands back the error of a failed fetch.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of the remote check, after the record has
    /// been reset to signed-out and `loading` cleared.
    pub async fn try_init(&self) -> Result<AuthState, ApiError> {
        let loading = LoadingGuard(self);
        let fetched = self.api.me().await;
        match &fetched {
            Ok(status) => self.record(status, Instant::now()),
            Err(e) => {
                tracing::debug!(error = %e, "auth init failed; treating as signed out");
                let mut inner = self.lock();
                inner.state.reset();
                inner.fetched_at = None;
            }
        }
        drop(loading);
        fetched.map(|_| self.snapshot())
    }

    /// Current auth status, served from cache while fresh.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of the remote check; the record is left as is.
    pub async fn status(&self) -> Result<AuthStatus, ApiError> {
        self.status_at(Instant::now()).await
    }

    async fn status_at(&self, now: Instant) -> Result<AuthStatus, ApiError> {
        if let Some(cached) = self.cached(now) {
            tracing::trace!("auth status served from cache");
            return Ok(cached);
        }
        let status = self.api.me().await.inspect_err(|_| self.invalidate())?;
        self.record(&status, now);
        Ok(status)
    }

    /// Forget the authenticated user locally, without a network call.
    pub fn logout_local(&self) {
        let mut inner = self.lock();
        inner.state.reset();
        inner.fetched_at = None;
    }

    /// Drop the cached status so the next check goes to the backend.
    pub fn invalidate(&self) {
        self.lock().fetched_at = None;
    }

    fn cached(&self, now: Instant) -> Option<AuthStatus> {
        if self.ttl.is_zero() {
            return None;
        }
        let inner = self.lock();
        let fetched_at = inner.fetched_at?;
        if now.saturating_duration_since(fetched_at) >= self.ttl {
            return None;
        }
        Some(AuthStatus {
            is_authenticated: inner.state.is_authenticated,
            username: inner.state.username.clone(),
        })
    }

    fn record(&self, status: &AuthStatus, now: Instant) {
        let mut inner = self.lock();
        inner.state.apply(status);
        inner.fetched_at = Some(now);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears `loading` when dropped.
struct LoadingGuard<'a>(&'a AuthContext);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().state.loading = false;
    }
}
