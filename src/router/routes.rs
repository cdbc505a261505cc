//! Route table and in-app locations.

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;

use std::fmt;
use std::str::FromStr;

/// Origin used only to let `Url` parse app-relative paths.
const PARSE_BASE: &str = "http://app.invalid/";

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid location '{0}'")]
    InvalidLocation(String),
    #[error("navigation to '{target}' exceeded {hops} redirects")]
    TooManyRedirects { target: String, hops: usize },
    #[error("navigation to '{0}' was superseded by a newer navigation")]
    Superseded(String),
    /// The auth check answered 401; the caller owns forced re-authentication.
    #[error("navigation to '{0}' stopped: session expired")]
    SessionExpired(String),
}

// =============================================================================
// ROUTES
// =============================================================================

/// Guard metadata attached to a route. The two flags are mutually exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub guest_only: bool,
}

impl RouteMeta {
    pub const OPEN: Self = Self { requires_auth: false, guest_only: false };
    pub const GUEST_ONLY: Self = Self { requires_auth: false, guest_only: true };
    pub const REQUIRES_AUTH: Self = Self { requires_auth: true, guest_only: false };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteName {
    Welcome,
    Login,
    Register,
    Dashboard,
    /// Catch-all for unknown paths.
    NotFound,
}

struct RouteDef {
    name: RouteName,
    path: &'static str,
    meta: RouteMeta,
}

const ROUTES: &[RouteDef] = &[
    RouteDef { name: RouteName::Welcome, path: "/", meta: RouteMeta::OPEN },
    RouteDef { name: RouteName::Login, path: "/login", meta: RouteMeta::GUEST_ONLY },
    RouteDef { name: RouteName::Register, path: "/register", meta: RouteMeta::GUEST_ONLY },
    RouteDef { name: RouteName::Dashboard, path: "/dashboard", meta: RouteMeta::REQUIRES_AUTH },
];

impl RouteName {
    /// Match a path against the table; unknown paths resolve to [`Self::NotFound`].
    #[must_use]
    pub fn resolve(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };
        ROUTES
            .iter()
            .find(|def| def.path == normalized)
            .map_or(Self::NotFound, |def| def.name)
    }

    /// Canonical path; `None` for the catch-all.
    #[must_use]
    pub fn path(self) -> Option<&'static str> {
        ROUTES.iter().find(|def| def.name == self).map(|def| def.path)
    }

    #[must_use]
    pub fn meta(self) -> RouteMeta {
        ROUTES
            .iter()
            .find(|def| def.name == self)
            .map_or(RouteMeta::OPEN, |def| def.meta)
    }
}

// =============================================================================
// LOCATION
// =============================================================================

/// An in-app location: path plus ordered query pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    path: String,
    query: Vec<(String, String)>,
}

impl Location {
    /// Location for `path` with no query. A missing leading `/` is added.
    #[must_use]
    pub fn new(path: &str) -> Self {
        let path = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };
        Self { path, query: Vec::new() }
    }

    /// Location of a named route (the catch-all maps to `/404`).
    #[must_use]
    pub fn of(route: RouteName) -> Self {
        Self::new(route.path().unwrap_or("/404"))
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value for `key`.
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn route(&self) -> RouteName {
        RouteName::resolve(&self.path)
    }

    /// Path plus encoded query string, e.g. `/login?redirect=/dashboard`.
    #[must_use]
    pub fn full_path(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{}={}", encode_query_component(key), encode_query_component(value))?;
        }
        Ok(())
    }
}

impl FromStr for Location {
    type Err = RouteError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.starts_with("//") {
            return Err(RouteError::InvalidLocation(raw.to_owned()));
        }
        let base = reqwest::Url::parse(PARSE_BASE).map_err(|_| RouteError::InvalidLocation(raw.to_owned()))?;
        let url = base.join(raw).map_err(|_| RouteError::InvalidLocation(raw.to_owned()))?;
        if url.origin() != base.origin() {
            return Err(RouteError::InvalidLocation(raw.to_owned()));
        }
        let query = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        Ok(Self { path: url.path().to_owned(), query })
    }
}

/// Percent-encode a query key or value, leaving `/` and other path-safe
/// characters readable.
fn encode_query_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' | b':' | b'@' | b'!' | b','
            | b';' | b'(' | b')' | b'*' | b'\'' => out.push(char::from(byte)),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
