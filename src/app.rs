//! App shell: composition root and top-level error boundary.
//!
//! SYSTEM CONTEXT
//! ==============
//! [`App`] wires one [`ApiClient`], one shared [`AuthContext`], the persisted
//! key-value store, and the [`Router`]. Every page-level command (sign in,
//! calculate, list history, ...) is an `App` method, so every backend call
//! passes through [`App::handle_error`] on its way back to the caller.
//!
//! ERROR HANDLING
//! ==============
//! An [`ApiError::Unauthorized`] from any call, login and the guard's own
//! auth checks included, forces re-authentication: the local auth record is dropped and the router is
//! hard-navigated to `/login?session_expired=true`, skipping the guard. The
//! error is then returned unchanged. Every other error passes through
//! untouched for the caller to show.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::net::api::ApiClient;
use crate::net::types::{
    Ack, ApiError, AuthApi, AuthStatus, CalculationRequest, CalculationResult, Credentials, HistoryEntry,
};
use crate::router::guard::{self, RouteGuard};
use crate::router::{Location, Navigation, RouteError, RouteName, Router, SESSION_EXPIRED_QUERY_KEY};
use crate::state::auth::{AuthContext, AuthState};
use crate::storage::{self, KeyValueStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Where a 401 sends the user.
#[must_use]
pub fn session_expired_location() -> Location {
    Location::of(RouteName::Login).with_query(SESSION_EXPIRED_QUERY_KEY, "true")
}

pub struct App {
    api: Arc<ApiClient>,
    auth: Arc<AuthContext>,
    storage: Arc<dyn KeyValueStore>,
    router: Router,
}

impl App {
    /// Build the app for `config`, keeping UI flags in `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        let api = ApiClient::new(config)?;
        Ok(Self::from_parts(api, config.auth_cache_ttl, storage))
    }

    #[must_use]
    pub fn from_parts(api: ApiClient, auth_cache_ttl: Duration, storage: Arc<dyn KeyValueStore>) -> Self {
        let api = Arc::new(api);
        let auth = Arc::new(AuthContext::new(Arc::clone(&api) as Arc<dyn AuthApi>, auth_cache_ttl));
        let router = Router::new(RouteGuard::new(Arc::clone(&auth), Arc::clone(&storage)));
        Self { api, auth, storage, router }
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.auth.snapshot()
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        storage::is_guest(self.storage.as_ref())
    }

    // -------------------------------------------------------------------------
    // startup / navigation
    // -------------------------------------------------------------------------

    /// Start the app on the welcome page.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] after a forced re-authentication,
    /// or an error if the initial navigation fails. Other CSRF and auth
    /// bootstrap failures are logged and tolerated.
    pub async fn bootstrap(&self) -> Result<Navigation, AppError> {
        self.bootstrap_at(Location::of(RouteName::Welcome)).await
    }

    /// Start the app on `initial`: fetch the CSRF cookie, load the auth
    /// record, then run a guarded navigation.
    ///
    /// A 401 while loading the auth record goes to the error boundary and the
    /// guarded navigation is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] after a forced re-authentication,
    /// or an error if the initial navigation fails.
    pub async fn bootstrap_at(&self, initial: Location) -> Result<Navigation, AppError> {
        self.api.init_csrf().await;
        if let Err(e) = self.auth.try_init().await {
            if e.is_unauthorized() {
                self.handle_error(&e);
                return Err(e.into());
            }
        }
        let state = self.auth.snapshot();
        tracing::info!(
            authenticated = state.is_authenticated,
            username = state.username.as_deref().unwrap_or(""),
            guest = self.is_guest(),
            "app bootstrapped"
        );
        self.navigate(initial).await
    }

    /// Guarded in-app navigation.
    ///
    /// An auth check answering 401 goes to the error boundary, so the app
    /// ends on the session-expired login page.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] after a forced re-authentication,
    /// or a [`RouteError`] if the redirect chain does not settle or a newer
    /// navigation took over.
    pub async fn navigate(&self, target: Location) -> Result<Navigation, AppError> {
        match self.router.navigate(target).await {
            Err(RouteError::SessionExpired(_)) => {
                let e = ApiError::Unauthorized;
                self.handle_error(&e);
                Err(e.into())
            }
            other => Ok(other?),
        }
    }

    // -------------------------------------------------------------------------
    // error boundary
    // -------------------------------------------------------------------------

    /// React to a failed backend call.
    ///
    /// Returns the navigation performed, if any.
    pub fn handle_error(&self, error: &ApiError) -> Option<Navigation> {
        if !error.is_unauthorized() {
            return None;
        }
        tracing::warn!("session expired; forcing re-authentication");
        self.auth.logout_local();
        Some(self.router.hard_navigate(session_expired_location()))
    }

    fn checked<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        result.inspect_err(|e| {
            self.handle_error(e);
        })
    }

    // -------------------------------------------------------------------------
    // session
    // -------------------------------------------------------------------------

    /// Fresh "who am I" answer from the backend.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of the check.
    pub async fn me(&self) -> Result<AuthStatus, AppError> {
        self.auth.invalidate();
        Ok(self.checked(self.auth.status().await)?)
    }

    /// Sign in, then go to the pending return URL or the dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for bad credentials (after the
    /// boundary has sent the user to the session-expired login page), or any
    /// other request or navigation failure.
    pub async fn login(&self, credentials: &Credentials) -> Result<Navigation, AppError> {
        let session = self.checked(self.api.login(credentials).await)?;
        tracing::info!(username = %session.username, "signed in");
        self.enter_session()?;
        let target = self.pending_return();
        self.navigate(target).await
    }

    /// Create an account; the backend signs the new user in.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] (400) when the username is taken.
    pub async fn register(&self, credentials: &Credentials) -> Result<Navigation, AppError> {
        let session = self.checked(self.api.register(credentials).await)?;
        tracing::info!(username = %session.username, "registered");
        self.enter_session()?;
        self.navigate(Location::of(RouteName::Dashboard)).await
    }

    /// Sign out on the backend, forget the user locally, and show the login page.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call or the navigation fails.
    pub async fn logout(&self) -> Result<Navigation, AppError> {
        let ack = self.checked(self.api.logout().await)?;
        tracing::info!(message = %ack.message, "signed out");
        self.auth.logout_local();
        self.navigate(Location::of(RouteName::Login)).await
    }

    /// Browse as a guest: protected pages open without a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be stored or navigation fails.
    pub async fn enter_guest(&self) -> Result<Navigation, AppError> {
        storage::set_guest(self.storage.as_ref(), true)?;
        tracing::info!("guest mode on");
        self.navigate(Location::of(RouteName::Dashboard)).await
    }

    /// Leave guest mode and return to the welcome page.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be stored or navigation fails.
    pub async fn exit_guest(&self) -> Result<Navigation, AppError> {
        storage::set_guest(self.storage.as_ref(), false)?;
        tracing::info!("guest mode off");
        self.navigate(Location::of(RouteName::Welcome)).await
    }

    fn enter_session(&self) -> Result<(), StorageError> {
        self.auth.invalidate();
        storage::set_guest(self.storage.as_ref(), false)
    }

    /// Return URL carried by the login page currently shown, if any.
    fn pending_return(&self) -> Location {
        self.router
            .current()
            .filter(|location| location.route() == RouteName::Login)
            .map_or_else(|| Location::of(RouteName::Dashboard), |location| guard::return_target(&location))
    }

    // -------------------------------------------------------------------------
    // calculator
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns the [`ApiError`] of the call, after the boundary has seen it.
    pub async fn calculate(&self, request: &CalculationRequest) -> Result<CalculationResult, AppError> {
        Ok(self.checked(self.api.calculate(request).await)?)
    }

    /// # Errors
    ///
    /// Returns the [`ApiError`] of the call, after the boundary has seen it.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, AppError> {
        Ok(self.checked(self.api.history().await)?)
    }

    /// # Errors
    ///
    /// Returns the [`ApiError`] of the call, after the boundary has seen it.
    pub async fn clear_history(&self) -> Result<Ack, AppError> {
        Ok(self.checked(self.api.clear_history().await)?)
    }

    /// # Errors
    ///
    /// Returns the [`ApiError`] of the call, after the boundary has seen it.
    pub async fn delete_history_item(&self, id: i64) -> Result<Ack, AppError> {
        Ok(self.checked(self.api.delete_history_item(id).await)?)
    }
}
