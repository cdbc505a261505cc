//! In-process stand-in for the calculator backend, used by HTTP tests.
//!
//! Mirrors the session + CSRF cookie behavior of the real service closely
//! enough to exercise the client pipeline: `csrftoken` is issued by
//! `/auth/csrf/` and rotated on login, mutating endpoints insist on a
//! matching `X-CSRFToken`, and protected endpoints answer 401 without a
//! session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use super::csrf::find_cookie;

pub const USERNAME: &str = "ada";
pub const PASSWORD: &str = "secret";
pub const FIRST_TOKEN: &str = "tok-1";
pub const ROTATED_TOKEN: &str = "tok-2";
const SESSION: &str = "valid-session";

#[derive(Debug, Default)]
pub struct Recorded {
    pub me_calls: usize,
    /// `X-CSRFToken` seen on each mutating request, in order.
    pub csrf_headers: Vec<Option<String>>,
}

#[derive(Clone)]
struct Backend {
    recorded: Arc<Mutex<Recorded>>,
    csrf_available: bool,
    /// When set, `/auth/me/` answers 401 regardless of the session.
    me_expired: Arc<AtomicBool>,
}

pub struct Running {
    pub api_base: String,
    recorded: Arc<Mutex<Recorded>>,
    me_expired: Arc<AtomicBool>,
}

impl Running {
    pub fn me_calls(&self) -> usize {
        self.recorded.lock().unwrap().me_calls
    }

    pub fn csrf_headers(&self) -> Vec<Option<String>> {
        self.recorded.lock().unwrap().csrf_headers.clone()
    }

    /// Make every later `/auth/me/` answer 401.
    pub fn expire_auth_check(&self) {
        self.me_expired.store(true, Ordering::SeqCst);
    }
}

/// Start a backend on an ephemeral port.
pub async fn spawn() -> Running {
    spawn_with(true).await
}

/// Start a backend whose CSRF endpoint always fails with 500.
pub async fn spawn_without_csrf() -> Running {
    spawn_with(false).await
}

/// Start a backend whose `/auth/me/` answers 401 from the first call.
pub async fn spawn_with_expired_auth_check() -> Running {
    let running = spawn_with(true).await;
    running.expire_auth_check();
    running
}

async fn spawn_with(csrf_available: bool) -> Running {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let me_expired = Arc::new(AtomicBool::new(false));
    let backend = Backend { recorded: Arc::clone(&recorded), csrf_available, me_expired: Arc::clone(&me_expired) };

    let app = Router::new()
        .route("/api/auth/csrf/", get(csrf))
        .route("/api/auth/me/", get(me))
        .route("/api/auth/login/", post(login))
        .route("/api/auth/register/", post(register))
        .route("/api/auth/logout/", post(logout))
        .route("/api/calculate/", post(calculate))
        .route("/api/history/", get(history))
        .route("/api/history/clear/", delete(clear_history))
        .route("/api/history/{id}/", delete(delete_history_item))
        .route("/api/expired/", get(expired))
        .route("/api/slow/", get(slow))
        .route("/api/garbage/", get(garbage))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Running { api_base: format!("http://{addr}/api"), recorded, me_expired }
}

// =============================================================================
// HELPERS
// =============================================================================

fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    find_cookie(raw, name)
}

fn has_session(headers: &HeaderMap) -> bool {
    cookie(headers, "sessionid") == Some(SESSION)
}

/// Record the CSRF header and check it against the cookie.
fn csrf_ok(backend: &Backend, headers: &HeaderMap) -> bool {
    let sent = headers
        .get("x-csrftoken")
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    let ok = sent.is_some() && sent.as_deref() == cookie(headers, "csrftoken");
    backend.recorded.lock().unwrap().csrf_headers.push(sent);
    ok
}

fn csrf_failed() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "detail": "CSRF Failed: CSRF token missing." }))).into_response()
}

fn not_authenticated() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Authentication credentials were not provided." })))
        .into_response()
}

fn start_session(body: Value) -> Response {
    (
        AppendHeaders([
            (header::SET_COOKIE, format!("sessionid={SESSION}; Path=/")),
            (header::SET_COOKIE, format!("csrftoken={ROTATED_TOKEN}; Path=/")),
        ]),
        Json(body),
    )
        .into_response()
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn csrf(State(backend): State<Backend>) -> Response {
    if !backend.csrf_available {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    (
        AppendHeaders([(header::SET_COOKIE, format!("csrftoken={FIRST_TOKEN}; Path=/"))]),
        Json(json!({ "detail": "CSRF cookie set" })),
    )
        .into_response()
}

async fn me(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.recorded.lock().unwrap().me_calls += 1;
    if backend.me_expired.load(Ordering::SeqCst) {
        return not_authenticated();
    }
    if has_session(&headers) {
        Json(json!({ "is_authenticated": true, "username": USERNAME })).into_response()
    } else {
        Json(json!({ "is_authenticated": false })).into_response()
    }
}

async fn login(State(backend): State<Backend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !csrf_ok(&backend, &headers) {
        return csrf_failed();
    }
    let username = body.get("username").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);
    if username != Some(USERNAME) || password != Some(PASSWORD) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid credentials" }))).into_response();
    }
    start_session(json!({ "message": "Login successful", "username": USERNAME, "is_authenticated": true }))
}

async fn register(State(backend): State<Backend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !csrf_ok(&backend, &headers) {
        return csrf_failed();
    }
    let username = body.get("username").and_then(Value::as_str).unwrap_or_default();
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Username and password required" }))).into_response();
    }
    if username == USERNAME {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "User already exists" }))).into_response();
    }
    start_session(json!({ "message": "Registered & logged in successfully", "username": username }))
}

async fn logout(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !csrf_ok(&backend, &headers) {
        return csrf_failed();
    }
    (
        AppendHeaders([(header::SET_COOKIE, "sessionid=; Path=/; Max-Age=0".to_owned())]),
        Json(json!({ "message": "Logged out" })),
    )
        .into_response()
}

async fn calculate(State(backend): State<Backend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !csrf_ok(&backend, &headers) {
        return csrf_failed();
    }
    let a = body.get("operand1").and_then(Value::as_f64).unwrap_or_default();
    let b = body.get("operand2").and_then(Value::as_f64).unwrap_or_default();
    let result = match body.get("operator").and_then(Value::as_str) {
        Some("+") => a + b,
        Some("-") => a - b,
        Some("*") => a * b,
        Some("/") if b == 0.0 => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Division by zero not allowed" })))
                .into_response();
        }
        Some("/") => a / b,
        _ => return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid operator" }))).into_response(),
    };
    (StatusCode::CREATED, Json(json!({ "saved": true, "result": result }))).into_response()
}

async fn history(headers: HeaderMap) -> Json<Value> {
    if !has_session(&headers) {
        return Json(json!([]));
    }
    Json(json!([{
        "id": 1,
        "operand1": 2.0,
        "operand2": 3.0,
        "operator": "+",
        "result": 5.0,
        "note": "",
        "created_at": "2024-05-01T10:00:00Z"
    }]))
}

async fn clear_history(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !csrf_ok(&backend, &headers) {
        return csrf_failed();
    }
    if !has_session(&headers) {
        return not_authenticated();
    }
    Json(json!({ "detail": "History cleared successfully" })).into_response()
}

async fn delete_history_item(State(backend): State<Backend>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if !csrf_ok(&backend, &headers) {
        return csrf_failed();
    }
    if !has_session(&headers) {
        return not_authenticated();
    }
    if id != 1 {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "History item not found" }))).into_response();
    }
    Json(json!({ "detail": "History item deleted" })).into_response()
}

async fn expired() -> Response {
    not_authenticated()
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({}))
}

async fn garbage() -> &'static str {
    "not json"
}
