//! Wire DTOs and errors for the calculator backend API.
//!
//! DESIGN
//! ======
//! Field names mirror the backend JSON exactly (`operand1`, `is_authenticated`,
//! ...) so serde derives stay one-to-one with the payloads. Failures from the
//! HTTP layer are folded into [`ApiError`]; a 401 always becomes
//! [`ApiError::Unauthorized`] so callers and the app-level error boundary can
//! match on it without inspecting status codes.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Longest note the backend stores for a calculation.
pub const MAX_NOTE_CHARS: usize = 500;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by backend API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend answered 401: the session is missing or expired.
    #[error("unauthorized: session missing or expired")]
    Unauthorized,

    /// The backend answered with any other non-success status.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The response body could not be deserialized.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The request was rejected locally before it was sent.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// HTTP status carried by the error, if the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Request(error.to_string())
        }
    }
}

/// Build an error for a failed response from its status and raw body.
///
/// The backend reports failures as `{"error": ...}` or `{"detail": ...}`;
/// anything else is passed through as the raw body text.
pub(crate) fn error_for_status(status: u16, body: &str) -> ApiError {
    if status == 401 {
        return ApiError::Unauthorized;
    }
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("detail"))
                .and_then(serde_json::Value::as_str)
                .map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_owned());
    ApiError::Status { status, message }
}

// =============================================================================
// AUTH CHECK SEAM
// =============================================================================

/// Source of the remote "who am I" answer.
///
/// Implemented by [`super::api::ApiClient`]; tests substitute scripted fakes.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// Query `GET /auth/me/`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the body is malformed.
    async fn me(&self) -> Result<AuthStatus, ApiError>;
}

// =============================================================================
// AUTH
// =============================================================================

/// Response of `GET /auth/me/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub is_authenticated: bool,
    #[serde(default)]
    pub username: Option<String>,
}

impl AuthStatus {
    #[must_use]
    pub fn authenticated(username: impl Into<String>) -> Self {
        Self { is_authenticated: true, username: Some(username.into()) }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Body of `POST /auth/login/` and `POST /auth/register/`.
#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Response of a successful login or registration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SessionResponse {
    pub message: String,
    pub username: String,
}

/// Generic `{"message": ...}` / `{"detail": ...}` acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Ack {
    #[serde(alias = "detail")]
    pub message: String,
}

// =============================================================================
// CALCULATOR
// =============================================================================

/// Arithmetic operator accepted by `POST /calculate/`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl Operator {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = ApiError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "+" => Ok(Self::Add),
            "-" => Ok(Self::Subtract),
            "*" => Ok(Self::Multiply),
            "/" => Ok(Self::Divide),
            other => Err(ApiError::Invalid(format!("unknown operator '{other}' (expected + - * /)"))),
        }
    }
}

/// Body of `POST /calculate/`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalculationRequest {
    pub operand1: f64,
    pub operand2: f64,
    pub operator: Operator,
    pub note: String,
}

impl CalculationRequest {
    /// Build a request, trimming the note and capping it at [`MAX_NOTE_CHARS`].
    #[must_use]
    pub fn new(operand1: f64, operator: Operator, operand2: f64, note: Option<&str>) -> Self {
        let note = note
            .map(str::trim)
            .unwrap_or_default()
            .chars()
            .take(MAX_NOTE_CHARS)
            .collect();
        Self { operand1, operand2, operator, note }
    }

    /// Reject operands the backend cannot represent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for NaN or infinite operands.
    pub fn validate(&self) -> Result<(), ApiError> {
        if !self.operand1.is_finite() || !self.operand2.is_finite() {
            return Err(ApiError::Invalid("operands must be finite numbers".to_owned()));
        }
        Ok(())
    }
}

/// Response of `POST /calculate/`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct CalculationResult {
    pub saved: bool,
    pub result: f64,
}

/// One row of `GET /history/`, newest first.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub operand1: f64,
    pub operand2: f64,
    pub operator: Operator,
    pub result: f64,
    #[serde(default)]
    pub note: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {} {} = {}", self.id, self.operand1, self.operator, self.operand2, self.result)?;
        if !self.note.is_empty() {
            write!(f, "  ({})", self.note)?;
        }
        Ok(())
    }
}
