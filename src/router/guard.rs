//! Pre-navigation guard.
//!
//! DESIGN
//! ======
//! Evaluated in a fixed order for every navigation:
//! 1. protected route + guest flag: proceed without asking the backend;
//! 2. protected route: proceed only if the remote check says authenticated,
//!    otherwise (including any check failure but 401) go to login with a
//!    return URL;
//! 3. guest-only route: signed-in users are sent to their return URL or the
//!    dashboard, guests to the dashboard, everyone else (including when the
//!    check fails with anything but 401) may stay;
//! 4. anything else proceeds.
//!
//! Protected routes fail closed, guest-only routes fail open. The guest flag
//! and the remote status are never merged into one answer.
//!
//! A 401 from the check is not a plain failure: on either kind of route it
//! yields [`Decision::SessionExpired`] so the caller can force
//! re-authentication instead of redirecting.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::sync::Arc;

use super::routes::{Location, RouteName};
use crate::state::auth::AuthContext;
use crate::storage::{self, KeyValueStore};

/// Query key carrying the originally requested location.
pub const REDIRECT_QUERY_KEY: &str = "redirect";

/// Outcome of a guard check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Redirect(Location),
    /// The backend answered 401 to the auth check.
    SessionExpired,
}

pub struct RouteGuard {
    auth: Arc<AuthContext>,
    storage: Arc<dyn KeyValueStore>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(auth: Arc<AuthContext>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self { auth, storage }
    }

    /// Decide whether navigation to `to` may proceed.
    pub async fn check(&self, to: &Location) -> Decision {
        let meta = to.route().meta();
        let guest = storage::is_guest(self.storage.as_ref());

        if meta.requires_auth && guest {
            return Decision::Proceed;
        }

        if meta.requires_auth {
            return match self.auth.status().await {
                Ok(status) if status.is_authenticated => Decision::Proceed,
                Ok(_) => Decision::Redirect(login_with_return(to)),
                Err(e) if e.is_unauthorized() => Decision::SessionExpired,
                Err(e) => {
                    tracing::warn!(error = %e, location = %to, "auth check failed; sending to login");
                    Decision::Redirect(login_with_return(to))
                }
            };
        }

        if meta.guest_only {
            match self.auth.status().await {
                Ok(status) if status.is_authenticated => return Decision::Redirect(return_target(to)),
                Ok(_) if guest => return Decision::Redirect(Location::of(RouteName::Dashboard)),
                Ok(_) => {}
                Err(e) if e.is_unauthorized() => return Decision::SessionExpired,
                Err(e) => tracing::debug!(error = %e, location = %to, "auth check failed; allowing guest-only page"),
            }
        }

        Decision::Proceed
    }
}

/// `/login?redirect=<full path of to>`.
#[must_use]
pub fn login_with_return(to: &Location) -> Location {
    Location::of(RouteName::Login).with_query(REDIRECT_QUERY_KEY, &to.full_path())
}

/// Where a signed-in user landing on a guest-only page should go.
///
/// Only in-app paths are honoured; anything else falls back to the dashboard.
pub(crate) fn return_target(to: &Location) -> Location {
    to.query(REDIRECT_QUERY_KEY)
        .filter(|raw| raw.starts_with('/') && !raw.starts_with("//"))
        .and_then(|raw| raw.parse::<Location>().ok())
        .unwrap_or_else(|| Location::of(RouteName::Dashboard))
}
