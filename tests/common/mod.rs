#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use admin_console::notify::RecordingNotifier;
use admin_console::session::{MemoryStorage, Storage};
use admin_console::{ApiClient, ClientConfig};
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

pub const USER_ID: i64 = 7;
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
pub const STALE_ACCESS: &str = "A1";
pub const INITIAL_REFRESH: &str = "R1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Succeed,
    /// 401 from the refresh endpoint
    Reject,
    /// 500 from the refresh endpoint
    Fail,
    /// 503 from a gateway in front of the token service
    Unavailable,
    /// HTTP 200 with a business error code
    Invalid,
}

#[derive(Debug, Clone)]
pub struct SeenCall {
    pub method: String,
    pub path: String,
    pub bearer: Option<String>,
}

pub struct MockState {
    valid_access: Mutex<Option<String>>,
    valid_refresh: Mutex<String>,
    generation: AtomicUsize,
    refresh_calls: AtomicUsize,
    refresh_mode: Mutex<RefreshMode>,
    refresh_delay: Mutex<Duration>,
    // Answer unauthenticated calls with HTTP 200 and envelope code 401
    envelope_unauthorized: AtomicBool,
    seen: Mutex<Vec<SeenCall>>,
}

impl MockState {
    fn new() -> Self {
        Self {
            valid_access: Mutex::new(None),
            valid_refresh: Mutex::new(INITIAL_REFRESH.to_string()),
            generation: AtomicUsize::new(1),
            refresh_calls: AtomicUsize::new(0),
            refresh_mode: Mutex::new(RefreshMode::Succeed),
            refresh_delay: Mutex::new(Duration::from_millis(0)),
            envelope_unauthorized: AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Mint a new token pair and make it the only one the server accepts.
    fn issue(&self) -> (String, String) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let access = mint_token(USER_ID, USERNAME, generation);
        let refresh = format!("R{}", generation);
        *self.valid_access.lock().unwrap() = Some(access.clone());
        *self.valid_refresh.lock().unwrap() = refresh.clone();
        (access, refresh)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let bearer = bearer(headers);
        let valid = self.valid_access.lock().unwrap().clone();
        bearer.is_some() && bearer == valid
    }

    fn record(&self, method: &str, path: &str, headers: &HeaderMap) {
        self.seen.lock().unwrap().push(SeenCall {
            method: method.to_string(),
            path: path.to_string(),
            bearer: bearer(headers),
        });
    }

    fn unauthorized(&self, message: &str) -> Response {
        let body = Json(json!({ "code": 401, "message": message, "data": null }));
        if self.envelope_unauthorized.load(Ordering::SeqCst) {
            (StatusCode::OK, body).into_response()
        } else {
            (StatusCode::UNAUTHORIZED, body).into_response()
        }
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind mock server")?;

        let state = Arc::new(MockState::new());
        let app = router(state.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("mock server stopped: {}", e);
            }
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}/api", port),
            state,
        })
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.state.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock().unwrap() = delay;
    }

    pub fn use_envelope_unauthorized(&self) {
        self.state.envelope_unauthorized.store(true, Ordering::SeqCst);
    }

    /// The server stops accepting the current access token.
    pub fn expire_access(&self) {
        *self.state.valid_access.lock().unwrap() = None;
    }

    pub fn valid_access(&self) -> Option<String> {
        self.state.valid_access.lock().unwrap().clone()
    }

    pub fn seen(&self) -> Vec<SeenCall> {
        self.state.seen.lock().unwrap().clone()
    }

    pub fn seen_on(&self, path: &str) -> Vec<SeenCall> {
        self.seen().into_iter().filter(|c| c.path == path).collect()
    }
}

/// Storage already holding an expired access token and a usable refresh token.
pub fn expired_session() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::with_entries([
        ("access_token", STALE_ACCESS),
        ("refresh_token", INITIAL_REFRESH),
    ]))
}

pub fn client(
    server: &MockServer,
    storage: Arc<dyn Storage>,
    notifier: Arc<RecordingNotifier>,
) -> Result<ApiClient> {
    client_with_config(ClientConfig::for_base_url(&server.base_url), storage, notifier)
}

pub fn client_with_config(
    config: ClientConfig,
    storage: Arc<dyn Storage>,
    notifier: Arc<RecordingNotifier>,
) -> Result<ApiClient> {
    Ok(ApiClient::new(&config, storage, notifier)?)
}

pub fn mint_token(user_id: i64, username: &str, generation: usize) -> String {
    let claims = json!({
        "userId": user_id,
        "username": username,
        "gen": generation,
        "exp": an_hour_from_now(),
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"mock-secret"))
        .expect("failed to mint token")
}

fn an_hour_from_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() + 3600)
        .unwrap_or(0)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn success(data: Value) -> Response {
    Json(json!({ "code": 200, "message": "ok", "data": data })).into_response()
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/system/users/:id", get(user))
        .route("/api/items/:id", get(item))
        .route("/api/forbidden", get(forbidden))
        .route("/api/broken", get(broken))
        .route("/api/business-error", get(business_error))
        .route("/api/always-401", get(always_unauthorized))
        .route("/api/plain", get(plain))
        .route("/api/echo", any(echo))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn login(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST", "/auth/login", &headers);
    let username = body.get("username").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);
    if username != Some(USERNAME) || password != Some(PASSWORD) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "code": 401, "message": "Invalid username or password" })),
        )
            .into_response();
    }

    let (access, refresh) = state.issue();
    success(json!({ "accessToken": access, "refreshToken": refresh, "expiresIn": 3600 }))
}

async fn refresh(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST", "/auth/refresh", &headers);
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = *state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mode = *state.refresh_mode.lock().unwrap();
    match mode {
        RefreshMode::Reject => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "code": 401, "message": "Refresh token expired" })),
            )
                .into_response()
        }
        RefreshMode::Fail => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "code": 500, "message": "Token service unavailable" })),
            )
                .into_response()
        }
        RefreshMode::Unavailable => {
            return (StatusCode::SERVICE_UNAVAILABLE, "upstream connect error").into_response()
        }
        RefreshMode::Invalid => {
            return Json(json!({ "code": 2001, "message": "Token invalid", "data": null })).into_response()
        }
        RefreshMode::Succeed => {}
    }

    let presented = body.get("refreshToken").and_then(Value::as_str).map(str::to_string);
    let expected = state.valid_refresh.lock().unwrap().clone();
    if presented.as_deref() != Some(expected.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "code": 401, "message": "Unknown refresh token" })),
        )
            .into_response();
    }

    let (access, refresh) = state.issue();
    success(json!({ "accessToken": access, "refreshToken": refresh, "expiresIn": 3600 }))
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("POST", "/auth/logout", &headers);
    if !state.authorized(&headers) {
        return state.unauthorized("Token expired");
    }
    *state.valid_access.lock().unwrap() = None;
    success(Value::Null)
}

async fn user(State(state): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let path = format!("/system/users/{}", id);
    state.record("GET", &path, &headers);
    if !state.authorized(&headers) {
        return state.unauthorized("Token expired");
    }
    success(json!({ "id": id, "username": USERNAME, "nickname": "Administrator" }))
}

async fn item(State(state): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let path = format!("/items/{}", id);
    state.record("GET", &path, &headers);
    if !state.authorized(&headers) {
        return state.unauthorized("Token expired");
    }
    success(json!({ "id": id }))
}

async fn forbidden(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("GET", "/forbidden", &headers);
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "code": 403, "message": "No access to this resource" })),
    )
        .into_response()
}

async fn broken(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("GET", "/broken", &headers);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "code": 500, "message": "Database unavailable" })),
    )
        .into_response()
}

async fn business_error(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("GET", "/business-error", &headers);
    if !state.authorized(&headers) {
        return state.unauthorized("Token expired");
    }
    Json(json!({ "code": 1001, "message": "Name already taken", "data": null })).into_response()
}

async fn always_unauthorized(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("GET", "/always-401", &headers);
    state.unauthorized("Account locked")
}

async fn plain(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("GET", "/plain", &headers);
    if !state.authorized(&headers) {
        return state.unauthorized("Token expired");
    }
    (StatusCode::OK, "pong").into_response()
}

async fn echo(
    State(state): State<Arc<MockState>>,
    method: axum::http::Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    state.record(method.as_str(), "/echo", &headers);
    if !state.authorized(&headers) {
        return state.unauthorized("Token expired");
    }
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    success(json!({ "method": method.as_str(), "query": query, "body": body }))
}

/// Poll `check` until it holds or a second has passed.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
