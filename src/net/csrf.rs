//! Anti-forgery token holder.
//!
//! DESIGN
//! ======
//! The backend issues its CSRF token in the `csrftoken` cookie and expects it
//! echoed back in `X-CSRFToken` on mutating requests. The value lives in an
//! explicit holder: the bootstrap call populates it, and every response
//! refreshes it from the cookie store, since login rotates the token.

#[cfg(test)]
#[path = "csrf_test.rs"]
mod csrf_test;

use std::sync::{PoisonError, RwLock};

/// Cookie carrying the token.
pub const CSRF_COOKIE_NAME: &str = "csrftoken";
/// Request header the backend reads the token from.
pub const CSRF_HEADER_NAME: &str = "X-CSRFToken";

/// Shared, interior-mutable CSRF token slot.
#[derive(Debug, Default)]
pub struct CsrfToken {
    value: RwLock<Option<String>>,
}

impl CsrfToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token, if one has been observed.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.value.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        let mut slot = self.value.write().unwrap_or_else(PoisonError::into_inner);
        *slot = (!token.is_empty()).then_some(token);
    }

    pub fn clear(&self) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Pull the token out of a `Cookie` header value (`a=1; csrftoken=...`).
    ///
    /// Returns `true` when the held value changed. A header without the
    /// cookie leaves the current value untouched.
    pub fn refresh_from_cookie_header(&self, header: &str) -> bool {
        let Some(found) = find_cookie(header, CSRF_COOKIE_NAME) else {
            return false;
        };
        if found.is_empty() || self.get().as_deref() == Some(found) {
            return false;
        }
        self.set(found);
        true
    }
}

/// Find `name` in a `Cookie` header value.
pub(crate) fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}
