//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_AUTH_CACHE_TTL_SECS: u64 = 5;
pub const DEFAULT_STORAGE_PATH: &str = ".calcdesk/storage.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid CALC_API_URL '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request: Duration,
    pub connect: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin without the `/api` suffix and without a trailing slash.
    pub api_url: String,
    pub timeouts: Timeouts,
    /// How long a successful auth check may be reused. Zero disables caching.
    pub auth_cache_ttl: Duration,
    /// JSON file backing the persisted key-value store (guest flag).
    pub storage_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            timeouts: Timeouts {
                request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
                connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            },
            auth_cache_ttl: Duration::from_secs(DEFAULT_AUTH_CACHE_TTL_SECS),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `CALC_API_URL`: backend origin, default `http://127.0.0.1:8000`
    /// - `CALC_REQUEST_TIMEOUT_SECS`: default 10
    /// - `CALC_CONNECT_TIMEOUT_SECS`: default 5
    /// - `CALC_AUTH_CACHE_TTL_SECS`: default 5
    /// - `CALC_STORAGE_PATH`: default `.calcdesk/storage.json`
    ///
    /// # Errors
    ///
    /// Returns an error if `CALC_API_URL` is not an http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if `CALC_API_URL` is not an http(s) URL.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("CALC_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        let api_url = normalize_api_url(&raw_url)?;

        let parse_secs = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };
        let timeouts = Timeouts {
            request: Duration::from_secs(parse_secs("CALC_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)),
            connect: Duration::from_secs(parse_secs("CALC_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)),
        };
        let auth_cache_ttl = Duration::from_secs(parse_secs("CALC_AUTH_CACHE_TTL_SECS", DEFAULT_AUTH_CACHE_TTL_SECS));
        let storage_path = lookup("CALC_STORAGE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from);

        Ok(Self { api_url, timeouts, auth_cache_ttl, storage_path })
    }

    /// Replace the backend origin, validated the same way as `CALC_API_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not an http(s) URL.
    pub fn with_api_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.api_url = normalize_api_url(raw)?;
        Ok(self)
    }

    /// Root of the JSON API, e.g. `http://127.0.0.1:8000/api`.
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("{}/api", self.api_url)
    }
}

/// Validate the backend origin and strip trailing slashes and a stray `/api`.
pub(crate) fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/api").unwrap_or(trimmed);
    let invalid = |reason: String| ConfigError::InvalidApiUrl { url: raw.to_owned(), reason };

    let parsed = reqwest::Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    Ok(trimmed.to_owned())
}
