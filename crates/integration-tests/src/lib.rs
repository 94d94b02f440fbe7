//! Integration test support for PropFee.
//!
//! Everything here runs in-process: the in-memory fee store, a store that
//! can be switched to fail, a local axum stand-in for the chat completions
//! endpoint, and a router wired with an in-memory session store.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p propfee-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tower::ServiceExt;
use tower_sessions::{MemoryStore as SessionMemoryStore, SessionManagerLayer};

use propfee_admin::config::InsightConfig;
use propfee_admin::db::{FeeStore, MemoryStore, PostedFee, RepositoryError, UserCredentials};
use propfee_admin::insight::InsightProvider;
use propfee_admin::middleware::SESSION_COOKIE_NAME;
use propfee_admin::services::hash_password;
use propfee_admin::state::AppState;
use propfee_core::{
    Amount, DashboardData, Department, DepartmentId, DepartmentPatch, FeeEntryRecord,
    FeeRecordId, NewDepartment, NewStaff, Staff, StaffId, StaffPatch, User, UserId, UserRole,
};

/// Password of the user created by [`TestApp::new`].
pub const TEST_PASSWORD: &str = "correct horse battery";
pub const TEST_USERNAME: &str = "admin";

// =============================================================================
// Fixtures
// =============================================================================

pub fn department(id: &str, name: &str) -> Department {
    Department {
        id: DepartmentId::new(id),
        name: name.to_owned(),
        color: "#6366f1".to_owned(),
        target_amount: None,
    }
}

pub fn staff(id: &str, name: &str, dept: Option<&str>, collected: u32, target: u32) -> Staff {
    Staff {
        id: StaffId::new(id),
        name: name.to_owned(),
        dept_id: dept.map(DepartmentId::new),
        collected_amount: Amount::from_yuan(collected),
        target: Amount::from_yuan(target),
    }
}

pub fn record(id: &str, staff_id: &str, amount: u32) -> FeeEntryRecord {
    FeeEntryRecord {
        id: FeeRecordId::new(id),
        staff_id: StaffId::new(staff_id),
        amount: Amount::from_yuan(amount),
        timestamp: Utc::now(),
    }
}

/// One department with A = 100/200 and B = 150/200.
pub fn two_collectors() -> DashboardData {
    DashboardData {
        departments: vec![department("dept-1", "住宅一部")],
        staff: vec![
            staff("a", "A", Some("dept-1"), 100, 200),
            staff("b", "B", Some("dept-1"), 150, 200),
        ],
        records: Vec::new(),
    }
}

pub fn test_user() -> User {
    User {
        id: UserId::new("user-1"),
        username: TEST_USERNAME.to_owned(),
        display_name: "管理员".to_owned(),
        role: UserRole::Admin,
    }
}

// =============================================================================
// Stores and providers
// =============================================================================

/// A store that fails every call while `failing` is set, and otherwise
/// delegates to an in-memory store.
///
/// [`FlakyStore::hold_next_fetch`] makes the next `fetch_all` read its data,
/// then park until [`FlakyStore::release_fetch`], so a test can interleave
/// writes with a reload that is already holding an old copy.
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
    hold_fetch: AtomicBool,
    fetch_parked: Notify,
    fetch_release: Notify,
}

impl FlakyStore {
    pub fn new(data: DashboardData) -> Self {
        Self {
            inner: MemoryStore::with_data(data),
            failing: AtomicBool::new(false),
            hold_fetch: AtomicBool::new(false),
            fetch_parked: Notify::new(),
            fetch_release: Notify::new(),
        }
    }

    pub fn hold_next_fetch(&self) {
        self.hold_fetch.store(true, Ordering::SeqCst);
    }

    /// Wait until a held fetch has read its data.
    pub async fn fetch_parked(&self) {
        self.fetch_parked.notified().await;
    }

    pub fn release_fetch(&self) {
        self.fetch_release.notify_one();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl FeeStore for FlakyStore {
    async fn fetch_all(&self) -> Result<DashboardData, RepositoryError> {
        self.check()?;
        let data = self.inner.fetch_all().await?;
        if self.hold_fetch.swap(false, Ordering::SeqCst) {
            self.fetch_parked.notify_one();
            self.fetch_release.notified().await;
        }
        Ok(data)
    }

    async fn post_fee_entry(
        &self,
        staff_id: &StaffId,
        amount: Amount,
    ) -> Result<PostedFee, RepositoryError> {
        self.check()?;
        self.inner.post_fee_entry(staff_id, amount).await
    }

    async fn register_department(
        &self,
        input: &NewDepartment,
    ) -> Result<Department, RepositoryError> {
        self.check()?;
        self.inner.register_department(input).await
    }

    async fn update_department(
        &self,
        id: &DepartmentId,
        patch: &DepartmentPatch,
    ) -> Result<Department, RepositoryError> {
        self.check()?;
        self.inner.update_department(id, patch).await
    }

    async fn delete_department(&self, id: &DepartmentId) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.delete_department(id).await
    }

    async fn register_staff(&self, input: &NewStaff) -> Result<Staff, RepositoryError> {
        self.check()?;
        self.inner.register_staff(input).await
    }

    async fn update_staff(
        &self,
        id: &StaffId,
        patch: &StaffPatch,
    ) -> Result<Staff, RepositoryError> {
        self.check()?;
        self.inner.update_staff(id, patch).await
    }

    async fn delete_staff(&self, id: &StaffId) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.delete_staff(id).await
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        self.check()?;
        self.inner.find_credentials(username).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check()
    }
}

/// Insight provider that returns fixed text and counts calls.
#[derive(Default)]
pub struct StaticInsight {
    text: String,
    calls: std::sync::atomic::AtomicUsize,
}

impl StaticInsight {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InsightProvider for StaticInsight {
    async fn summarize(&self, _data: &DashboardData) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text.clone()
    }
}

// =============================================================================
// Mock chat completions endpoint
// =============================================================================

/// What the mock endpoint answers.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 with this completion text.
    Completion(String),
    /// This status with this JSON body.
    Status(u16, Value),
    /// Wait, then answer with this completion text.
    Delayed(Duration, String),
}

/// A request the mock endpoint received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    reply: MockReply,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Local stand-in for an OpenAI-compatible chat completions endpoint.
pub struct MockInsightServer {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockInsightServer {
    pub async fn start(reply: MockReply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            reply,
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/v1/chat/completions", post(mock_completions))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/v1/chat/completions"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Client config pointing at this server.
    pub fn config(&self, api_key: Option<&str>) -> InsightConfig {
        InsightConfig {
            api_key: api_key.map(secrecy::SecretString::from),
            api_url: self.url.clone(),
            model: "deepseek-ai/DeepSeek-V3".to_owned(),
            timeout: Duration::from_secs(5),
        }
    }
}

fn completion(text: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    })
}

async fn mock_completions(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.requests.lock().unwrap().push(RecordedRequest {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        body,
    });

    match state.reply {
        MockReply::Completion(text) => Json(completion(&text)).into_response(),
        MockReply::Status(status, body) => (
            StatusCode::from_u16(status).unwrap(),
            Json(body),
        )
            .into_response(),
        MockReply::Delayed(delay, text) => {
            tokio::time::sleep(delay).await;
            Json(completion(&text)).into_response()
        }
    }
}

// =============================================================================
// HTTP test app
// =============================================================================

/// The full router over an in-memory store with one login.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestApp {
    pub async fn new(data: DashboardData, insight: Arc<dyn InsightProvider>) -> Self {
        let hash = hash_password(TEST_PASSWORD).unwrap();
        let store = Arc::new(MemoryStore::with_data(data).with_user(test_user(), hash));
        let state = AppState::new(store.clone(), insight);
        state.dashboard().load().await.unwrap();

        let sessions = SessionManagerLayer::new(SessionMemoryStore::default())
            .with_name(SESSION_COOKIE_NAME)
            .with_secure(false);
        let router = propfee_admin::app(state.clone()).layer(sessions);

        Self {
            router,
            store,
            state,
        }
    }

    /// Send a request, returning status, headers and the JSON body
    /// (`Value::Null` when the body is empty or not JSON).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, json)
    }

    /// Log in and return the `name=value` session cookie.
    pub async fn login(&self) -> String {
        let (status, headers, _) = self
            .send(
                Method::POST,
                "/api/auth/login",
                Some(json!({ "username": TEST_USERNAME, "password": TEST_PASSWORD })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        session_cookie(&headers).expect("login sets a session cookie")
    }
}

/// Extract `name=value` of the session cookie from a response.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(SESSION_COOKIE_NAME))
        .and_then(|v| v.split(';').next())
        .map(str::to_owned)
}

/// Wait until `check` holds, polling every 10 ms for up to two seconds.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
