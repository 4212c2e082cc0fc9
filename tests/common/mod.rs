//! Shared fixtures: an in-process mock of the GigMarket backend, a
//! navigation recorder, and a harness wiring them to a fresh client.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{json, Value};

use gigmarket_core::{
    ApiClient, Navigation, Navigator, SessionStorage, SessionStore,
};

pub const TEST_EMAIL: &str = "ana@example.com";
pub const TEST_PASSWORD: &str = "secret";

/// Build a JWT-shaped token (unsigned; the client never verifies) with the
/// given expiry offset from now.
pub fn make_jwt(email: &str, ttl_secs: i64, serial: usize) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = json!({
        "email": email,
        "exp": chrono::Utc::now().timestamp() + ttl_secs,
        "jti": serial,
    });
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.test-signature")
}

// ============================================================================
// Navigation recorder
// ============================================================================

#[derive(Default)]
pub struct RecordingNavigator {
    events: Mutex<Vec<Navigation>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: Navigation) {
        self.events.lock().unwrap().push(target);
    }
}

impl RecordingNavigator {
    pub fn events(&self) -> Vec<Navigation> {
        self.events.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Navigation> {
        self.events.lock().unwrap().last().cloned()
    }
}

// ============================================================================
// Mock backend
// ============================================================================

pub enum RefreshBehavior {
    /// Accept a matching refresh token and rotate the pair.
    Rotate,
    /// Reject every refresh with this status and message.
    Fail { status: u16, message: String },
}

pub struct BackendState {
    pub role: Mutex<String>,
    pub valid_access: Mutex<String>,
    pub valid_refresh: Mutex<String>,
    pub refresh_behavior: Mutex<RefreshBehavior>,
    /// Artificial latency on the refresh endpoint, so tests can hold the
    /// flight open while concurrent requests pile up behind it.
    pub refresh_delay: Mutex<Duration>,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub token_serial: AtomicUsize,
    pub last_service_query: Mutex<Option<HashMap<String, String>>>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            role: Mutex::new("user".to_string()),
            valid_access: Mutex::new(String::new()),
            valid_refresh: Mutex::new(String::new()),
            refresh_behavior: Mutex::new(RefreshBehavior::Rotate),
            refresh_delay: Mutex::new(Duration::ZERO),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            token_serial: AtomicUsize::new(0),
            last_service_query: Mutex::new(None),
        }
    }
}

impl BackendState {
    /// Mint a fresh credential pair and make it the only valid one.
    pub fn issue_credentials(&self) -> (String, String) {
        let serial = self.token_serial.fetch_add(1, Ordering::SeqCst);
        let access = make_jwt(TEST_EMAIL, 3600, serial);
        let refresh = format!("refresh-{serial}");
        *self.valid_access.lock().unwrap() = access.clone();
        *self.valid_refresh.lock().unwrap() = refresh.clone();
        (access, refresh)
    }

    pub fn profile_json(&self) -> Value {
        json!({
            "id": 7,
            "username": "ana",
            "email": TEST_EMAIL,
            "role": *self.role.lock().unwrap(),
        })
    }
}

fn bearer_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
}

async fn login(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["password"] != TEST_PASSWORD {
        return unauthorized("Invalid email or password");
    }
    let (access, refresh) = state.issue_credentials();
    Json(json!({
        "token": access,
        "refreshToken": refresh,
        "user": state.profile_json(),
    }))
    .into_response()
}

async fn refresh(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    match &*state.refresh_behavior.lock().unwrap() {
        RefreshBehavior::Fail { status, message } => (
            StatusCode::from_u16(*status).unwrap(),
            Json(json!({ "message": message })),
        )
            .into_response(),
        RefreshBehavior::Rotate => {
            let presented = body["token"].as_str().unwrap_or_default();
            if presented != *state.valid_refresh.lock().unwrap() {
                return unauthorized("Refresh token invalid");
            }
            let (access, refresh) = state.issue_credentials();
            Json(json!({ "token": access, "refreshToken": refresh })).into_response()
        }
    }
}

async fn me(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.me_calls.fetch_add(1, Ordering::SeqCst);
    match bearer_of(&headers) {
        Some(token) if token == *state.valid_access.lock().unwrap() => {
            Json(state.profile_json()).into_response()
        }
        _ => unauthorized("Token expired"),
    }
}

async fn services(
    State(state): State<Arc<BackendState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    *state.last_service_query.lock().unwrap() = Some(query);
    Json(json!([
        {
            "id": 1,
            "title": "Garden design",
            "description": "Full garden redesign",
            "price": 120.0,
            "category": "gardening",
            "sellerId": 7,
        },
        {
            "id": 2,
            "title": "Lawn mowing",
            "description": "Weekly mowing",
            "price": 25.0,
            "category": "gardening",
            "sellerId": 7,
        },
    ]))
    .into_response()
}

async fn service_by_id(Path(id): Path<i64>) -> Response {
    if id == 1 {
        Json(json!({
            "id": 1,
            "title": "Garden design",
            "description": "Full garden redesign",
            "price": 120.0,
            "category": "gardening",
            "sellerId": 7,
        }))
        .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Service not found" })),
        )
            .into_response()
    }
}

async fn seller_stats(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    match bearer_of(&headers) {
        Some(token) if token == *state.valid_access.lock().unwrap() => (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Access denied: seller role required" })),
        )
            .into_response(),
        _ => unauthorized("Token expired"),
    }
}

async fn create_review(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    match bearer_of(&headers) {
        Some(token) if token == *state.valid_access.lock().unwrap() => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Rating must be between 1 and 5" })),
        )
            .into_response(),
        _ => unauthorized("Token expired"),
    }
}

async fn notifications(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    match bearer_of(&headers) {
        Some(token) if token == *state.valid_access.lock().unwrap() => Json(json!([
            { "id": 1, "message": "Booking confirmed", "isRead": false },
        ]))
        .into_response(),
        _ => unauthorized("Token expired"),
    }
}

async fn spawn_backend(state: Arc<BackendState>) -> String {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/user/me", get(me))
        .route("/api/service", get(services))
        .route("/api/service/{id}", get(service_by_id))
        .route("/api/seller/stats", get(seller_stats))
        .route("/api/review", post(create_review))
        .route("/api/notification", get(notifications))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock backend");
    });
    format!("http://{addr}/api")
}

// ============================================================================
// Harness
// ============================================================================

pub struct TestHarness {
    pub api: ApiClient,
    pub store: SessionStore,
    pub storage: Arc<SessionStorage>,
    pub navigator: Arc<RecordingNavigator>,
    pub backend: Arc<BackendState>,
    _dir: tempfile::TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();

        let backend = Arc::new(BackendState::default());
        let base_url = spawn_backend(Arc::clone(&backend)).await;

        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Arc::new(SessionStorage::new(dir.path()).expect("storage"));
        let navigator = Arc::new(RecordingNavigator::default());
        let api = ApiClient::new(
            base_url,
            Arc::clone(&storage),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        )
        .expect("client");
        let store = SessionStore::new(
            api.clone(),
            Arc::clone(&storage),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        );

        Self {
            api,
            store,
            storage,
            navigator,
            backend,
            _dir: dir,
        }
    }

    /// Store a valid session client-side that the backend also accepts.
    pub fn seed_valid_session(&self) {
        let (access, refresh) = self.backend.issue_credentials();
        self.storage
            .store_credentials(&gigmarket_core::CredentialPair {
                access_token: access,
                refresh_token: refresh,
            })
            .expect("seed credentials");
    }

    /// Store a session whose access token is expired but whose refresh
    /// token the backend will accept (and rotate).
    pub fn seed_expired_session(&self) {
        let (_, refresh) = self.backend.issue_credentials();
        let stale = make_jwt(TEST_EMAIL, -60, 9999);
        self.storage
            .store_credentials(&gigmarket_core::CredentialPair {
                access_token: stale,
                refresh_token: refresh,
            })
            .expect("seed credentials");
    }

    /// Store a valid-looking session the backend no longer recognizes,
    /// so the first authenticated request 401s and triggers a refresh.
    pub fn seed_stale_session(&self) {
        let (_, refresh) = self.backend.issue_credentials();
        let stale = make_jwt(TEST_EMAIL, 3600, 9999);
        self.storage
            .store_credentials(&gigmarket_core::CredentialPair {
                access_token: stale,
                refresh_token: refresh,
            })
            .expect("seed credentials");
    }
}
