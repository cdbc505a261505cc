//! Authenticated HTTP client for the calculator backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every backend call goes through [`ApiClient::send`], which plays the part
//! of a request/response interceptor pair:
//! - outgoing: the cookie store is always attached (session credentials are
//!   included on every request) and `X-CSRFToken` is set when a token is held;
//! - incoming: successes pass through untouched, failures become a typed
//!   [`ApiError`], with 401 reported as [`ApiError::Unauthorized`].
//!
//! ERROR HANDLING
//! ==============
//! The client never navigates. Forced re-authentication on 401 is the app
//! shell's job (`crate::app::App`), which sees the typed error and decides.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::Arc;

use reqwest::Method;
use reqwest::cookie::{CookieStore, Jar};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::csrf::{CSRF_HEADER_NAME, CsrfToken};
use super::types::{Ack, ApiError, AuthApi, AuthStatus, Credentials, SessionResponse, error_for_status};
use crate::config::{ClientConfig, Timeouts};

const CSRF_PATH: &str = "/auth/csrf/";
const ME_PATH: &str = "/auth/me/";
const LOGIN_PATH: &str = "/auth/login/";
const REGISTER_PATH: &str = "/auth/register/";
const LOGOUT_PATH: &str = "/auth/logout/";

// =============================================================================
// CLIENT
// =============================================================================

pub struct ApiClient {
    http: reqwest::Client,
    api_base: String,
    jar: Arc<Jar>,
    csrf: Arc<CsrfToken>,
}

impl ApiClient {
    /// Build a client for `config.api_base()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::with_base(&config.api_base(), config.timeouts)
    }

    /// Build a client rooted at `api_base` (already including `/api`).
    ///
    /// # Errors
    ///
    /// Returns an error if the base is not a URL or the HTTP client fails to build.
    pub fn with_base(api_base: &str, timeouts: Timeouts) -> Result<Self, ApiError> {
        let api_base = api_base.trim_end_matches('/').to_owned();
        reqwest::Url::parse(&api_base).map_err(|e| ApiError::HttpClientBuild(format!("invalid base {api_base}: {e}")))?;

        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;

        Ok(Self { http, api_base, jar, csrf: Arc::new(CsrfToken::new()) })
    }

    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// The CSRF token holder shared with request building.
    #[must_use]
    pub fn csrf(&self) -> &CsrfToken {
        &self.csrf
    }

    /// Fetch the CSRF cookie once at startup.
    ///
    /// Failure is logged and swallowed: the app keeps running and later
    /// mutating calls surface the missing token through their own errors.
    /// Returns whether a token is held afterwards.
    pub async fn init_csrf(&self) -> bool {
        match self.send(Method::GET, CSRF_PATH, None).await {
            Ok(_) if self.csrf.get().is_some() => {
                tracing::debug!("csrf token initialized");
                true
            }
            Ok(_) => {
                tracing::warn!("csrf endpoint answered without a csrftoken cookie");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "CSRF init failed (non-fatal)");
                self.csrf.get().is_some()
            }
        }
    }

    // -------------------------------------------------------------------------
    // auth endpoints
    // -------------------------------------------------------------------------

    /// `POST /auth/login/`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for bad credentials, or any other
    /// request failure.
    pub async fn login(&self, credentials: &Credentials) -> Result<SessionResponse, ApiError> {
        self.post_json(LOGIN_PATH, credentials).await
    }

    /// `POST /auth/register/`; the backend logs the new user in.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] (400) when the user exists or fields are missing.
    pub async fn register(&self, credentials: &Credentials) -> Result<SessionResponse, ApiError> {
        self.post_json(REGISTER_PATH, credentials).await
    }

    /// `POST /auth/logout/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn logout(&self) -> Result<Ack, ApiError> {
        self.post_json(LOGOUT_PATH, &serde_json::json!({})).await
    }

    // -------------------------------------------------------------------------
    // transport
    // -------------------------------------------------------------------------

    /// `GET path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] for transport, status, or decode failures.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.send(Method::GET, path, None).await?;
        decode(&body)
    }

    /// `POST path` with a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] for transport, status, or decode failures.
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Invalid(e.to_string()))?;
        let body = self.send(Method::POST, path, Some(value)).await?;
        decode(&body)
    }

    /// `DELETE path` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] for transport, status, or decode failures.
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.send(Method::DELETE, path, None).await?;
        decode(&body)
    }

    /// Issue one request and return the raw success body.
    async fn send(&self, method: Method, path: &str, body: Option<serde_json::Value>) -> Result<String, ApiError> {
        let url = self.url(path)?;

        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(token) = self.csrf.get() {
            request = request.header(CSRF_HEADER_NAME, token);
        }
        if let Some(json) = body {
            request = request.json(&json);
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!(%method, path, error = %e, "request not completed");
            ApiError::from(e)
        })?;
        self.refresh_csrf(&url);

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::debug!(%method, path, status = status.as_u16(), "request failed");
            return Err(error_for_status(status.as_u16(), &text));
        }
        Ok(text)
    }

    fn url(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        let path = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };
        reqwest::Url::parse(&format!("{}{path}", self.api_base)).map_err(|e| ApiError::Invalid(e.to_string()))
    }

    fn refresh_csrf(&self, url: &reqwest::Url) {
        let Some(header) = self.jar.cookies(url) else {
            return;
        };
        if let Ok(raw) = header.to_str() {
            if self.csrf.refresh_from_cookie_header(raw) {
                tracing::debug!("csrf token refreshed from cookie store");
            }
        }
    }
}

#[async_trait::async_trait]
impl AuthApi for ApiClient {
    async fn me(&self) -> Result<AuthStatus, ApiError> {
        self.get_json(ME_PATH).await
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}
