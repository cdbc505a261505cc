//! In-app navigation.
//!
//! SYSTEM CONTEXT
//! ==============
//! `routes` defines the route table and locations, `guard` decides whether a
//! transition may proceed, and [`Router`] drives a navigation to a settled
//! location: every redirect is guarded again, up to [`MAX_REDIRECTS`] hops.
//!
//! A newer navigation supersedes one still waiting on its guard; the older
//! call returns [`RouteError::Superseded`] and never commits.
//!
//! A guard check that answers 401 ends the navigation with
//! [`RouteError::SessionExpired`], also without committing; the app shell
//! turns that into a forced re-authentication.

pub mod guard;
pub mod routes;


use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use guard::{Decision, REDIRECT_QUERY_KEY, RouteGuard};
pub use routes::{Location, RouteError, RouteMeta, RouteName};

/// Longest redirect chain followed before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// Query flag set by forced re-authentication.
pub const SESSION_EXPIRED_QUERY_KEY: &str = "session_expired";

// =============================================================================
// PAGES
// =============================================================================

/// What the settled location renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Page {
    Welcome,
    Login { session_expired: bool, redirect: Option<String> },
    Register,
    Dashboard,
    NotFound { path: String },
}

impl Page {
    #[must_use]
    pub fn for_location(location: &Location) -> Self {
        match location.route() {
            RouteName::Welcome => Self::Welcome,
            RouteName::Login => Self::Login {
                session_expired: location.query(SESSION_EXPIRED_QUERY_KEY) == Some("true"),
                redirect: location.query(REDIRECT_QUERY_KEY).map(ToOwned::to_owned),
            },
            RouteName::Register => Self::Register,
            RouteName::Dashboard => Self::Dashboard,
            RouteName::NotFound => Self::NotFound { path: location.path().to_owned() },
        }
    }
}

/// Result of a completed navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub location: Location,
    pub page: Page,
    /// Guard redirects followed before settling.
    pub redirects: usize,
}

// =============================================================================
// ROUTER
// =============================================================================

pub struct Router {
    guard: RouteGuard,
    generation: AtomicU64,
    history: Mutex<Vec<Location>>,
}

impl Router {
    #[must_use]
    pub fn new(guard: RouteGuard) -> Self {
        Self { guard, generation: AtomicU64::new(0), history: Mutex::new(Vec::new()) }
    }

    /// Guarded navigation to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::TooManyRedirects`] if the chain does not settle,
    /// [`RouteError::Superseded`] if another navigation started meanwhile, or
    /// [`RouteError::SessionExpired`] if an auth check answered 401.
    pub async fn navigate(&self, target: Location) -> Result<Navigation, RouteError> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut location = target.clone();

        for hop in 0..=MAX_REDIRECTS {
            let decision = self.guard.check(&location).await;
            if self.generation.load(Ordering::SeqCst) != ticket {
                tracing::debug!(requested = %target, "navigation superseded");
                return Err(RouteError::Superseded(target.full_path()));
            }
            match decision {
                Decision::Proceed => {
                    tracing::debug!(location = %location, redirects = hop, "navigation settled");
                    return Ok(self.commit(location, hop));
                }
                Decision::Redirect(next) => {
                    tracing::debug!(from = %location, to = %next, "guard redirect");
                    location = next;
                }
                Decision::SessionExpired => {
                    tracing::debug!(requested = %target, at = %location, "auth check answered 401");
                    return Err(RouteError::SessionExpired(target.full_path()));
                }
            }
        }

        tracing::warn!(requested = %target, "redirect limit reached");
        Err(RouteError::TooManyRedirects { target: target.full_path(), hops: MAX_REDIRECTS })
    }

    /// Set the location without consulting the guard.
    ///
    /// Cancels any navigation still waiting on its guard.
    pub fn hard_navigate(&self, location: Location) -> Navigation {
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::info!(location = %location, "hard navigation");
        self.commit(location, 0)
    }

    /// The settled location, if any navigation has completed.
    #[must_use]
    pub fn current(&self) -> Option<Location> {
        self.lock_history().last().cloned()
    }

    /// Every settled location, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Location> {
        self.lock_history().clone()
    }

    fn commit(&self, location: Location, redirects: usize) -> Navigation {
        self.lock_history().push(location.clone());
        let page = Page::for_location(&location);
        Navigation { location, page, redirects }
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, Vec<Location>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
