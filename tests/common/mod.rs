#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use careorders::auth::{DecodedClaims, RoleClaim};
use careorders::config::AppConfig;
use careorders::identity::{IdentityError, IdentityProvider, LocalIdentityProvider};
use careorders::services::staff_registry;
use careorders::store::{
    DocumentStore, Document, MemoryStore, Page, PageRequest, Query, StoreError, WriteBatch, WriteResult,
};
use careorders::{app, AppState};

// ---------------------------------------------------------------------------
// In-process application
// ---------------------------------------------------------------------------

/// Router plus handles on its collaborators.
///
/// Identity accounts live in their own memory store so `store` counts only
/// application data traffic.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<CountingStore>,
    pub identity: Arc<LocalIdentityProvider>,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(inner: Arc<dyn DocumentStore>) -> Self {
        Self::build(AppConfig::development(), inner, local_identity)
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(config, Arc::new(MemoryStore::new()), local_identity)
    }

    /// Wrap the local provider before handing it to the router.
    pub fn with_identity(wrap: impl FnOnce(Arc<LocalIdentityProvider>) -> Arc<dyn IdentityProvider>) -> Self {
        Self::build(AppConfig::development(), Arc::new(MemoryStore::new()), wrap)
    }

    fn build(
        config: AppConfig,
        inner: Arc<dyn DocumentStore>,
        wrap: impl FnOnce(Arc<LocalIdentityProvider>) -> Arc<dyn IdentityProvider>,
    ) -> Self {
        let store = Arc::new(CountingStore::new(inner));
        let identity = Arc::new(LocalIdentityProvider::new(&config.session, Arc::new(MemoryStore::new())));

        let mut state = AppState::new(config.clone(), store.clone(), wrap(identity.clone()));
        if config.session.allow_dev_sign_in {
            state = state.with_dev_sign_in(identity.clone());
        }

        Self {
            router: app(state),
            store,
            identity,
            config,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn register_staff(&self, uid: &str) {
        staff_registry::register(self.store.as_ref(), uid, None, None)
            .await
            .expect("register staff");
    }

    /// Browser sign-in flow: `/dev/signIn`, `/sessionLogin`, and a second
    /// round when the server reports new role claims. Returns the session token.
    pub async fn login(&self, uid: &str, email: &str, name: &str) -> String {
        for _ in 0..2 {
            let id_token = self.dev_sign_in(uid, email, name).await;
            let response = self
                .send(post_json("/sessionLogin", json!({ "uid": uid, "idToken": id_token })))
                .await;
            assert_eq!(response.status(), StatusCode::OK, "sessionLogin failed for {}", uid);

            let token = session_from_set_cookie(&response).expect("session cookie");
            let body = body_json(response).await;
            if body["refreshRequired"] == false {
                return token;
            }
        }
        panic!("role claims did not settle for {}", uid);
    }

    pub async fn login_patient(&self, uid: &str) -> String {
        self.login(uid, &format!("{}@example.com", uid), &format!("Patient {}", uid))
            .await
    }

    pub async fn login_staff(&self, uid: &str) -> String {
        self.register_staff(uid).await;
        self.login(uid, &format!("{}@clinic.example.com", uid), &format!("Dr. {}", uid))
            .await
    }

    pub async fn dev_sign_in(&self, uid: &str, email: &str, name: &str) -> String {
        let response = self
            .send(post_json(
                "/dev/signIn",
                json!({ "uid": uid, "email": email, "name": name }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["idToken"]
            .as_str()
            .expect("idToken")
            .to_string()
    }

    /// Mint a session directly through the provider with the given role.
    pub async fn session_with_role(&self, uid: &str, role: RoleClaim) -> String {
        let email = format!("{}@example.com", uid);
        self.identity.sign_in(uid, &email, uid).await.expect("sign in");
        self.identity.set_custom_claims(uid, role).await.expect("claims");
        let id_token = self.identity.sign_in(uid, &email, uid).await.expect("sign in");
        self.identity
            .create_session_cookie(&id_token, Duration::from_secs(3600))
            .await
            .expect("session")
    }
}

fn local_identity(local: Arc<LocalIdentityProvider>) -> Arc<dyn IdentityProvider> {
    local
}

pub fn failing_revoke(local: Arc<LocalIdentityProvider>) -> Arc<dyn IdentityProvider> {
    Arc::new(FailingRevoke(local))
}

// ---------------------------------------------------------------------------
// Request / response helpers
// ---------------------------------------------------------------------------

fn with_session(builder: axum::http::request::Builder, session: Option<&str>) -> axum::http::request::Builder {
    match session {
        Some(token) => builder.header(header::COOKIE, format!("session={}", token)),
        None => builder,
    }
}

pub fn get(uri: &str, session: Option<&str>) -> Request<Body> {
    with_session(Request::builder().method("GET").uri(uri), session)
        .body(Body::empty())
        .expect("request")
}

pub fn post_form(uri: &str, session: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    with_session(Request::builder().method("POST").uri(uri), session)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request")
}

pub fn post_json(uri: &str, value: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .expect("request")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).expect("json body")
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok())
}

pub fn set_cookie(response: &Response<Body>) -> Option<&str> {
    response.headers().get(header::SET_COOKIE).and_then(|v| v.to_str().ok())
}

pub fn session_from_set_cookie(response: &Response<Body>) -> Option<String> {
    set_cookie(response)?
        .split(';')
        .next()?
        .trim()
        .strip_prefix("session=")
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub fn assert_redirect(response: &Response<Body>, to: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response), Some(to));
}

// ---------------------------------------------------------------------------
// Store fakes
// ---------------------------------------------------------------------------

/// Delegating store that counts reads and writes.
pub struct CountingStore {
    inner: Arc<dyn DocumentStore>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(collection, id).await
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.query(collection, query).await
    }

    async fn list(&self, collection: &str, page: &PageRequest) -> Result<Page, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.list(collection, page).await
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<WriteResult, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(collection, id, data).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<WriteResult, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(collection, id).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<WriteResult, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.commit(batch).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner.health_check().await
    }
}

/// Store whose every call fails as if the backend were unreachable.
pub struct UnavailableStore;

fn unreachable_backend() -> StoreError {
    StoreError::Unavailable("connection refused (10.0.0.9:5432)".to_string())
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<Document>, StoreError> {
        Err(unreachable_backend())
    }

    async fn query(&self, _collection: &str, _query: &Query) -> Result<Vec<Document>, StoreError> {
        Err(unreachable_backend())
    }

    async fn list(&self, _collection: &str, _page: &PageRequest) -> Result<Page, StoreError> {
        Err(unreachable_backend())
    }

    async fn set(&self, _collection: &str, _id: &str, _data: Document) -> Result<WriteResult, StoreError> {
        Err(unreachable_backend())
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<WriteResult, StoreError> {
        Err(unreachable_backend())
    }

    async fn commit(&self, _batch: WriteBatch) -> Result<WriteResult, StoreError> {
        Err(unreachable_backend())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(unreachable_backend())
    }
}

/// Provider whose revocation always fails; everything else delegates.
pub struct FailingRevoke(pub Arc<LocalIdentityProvider>);

#[async_trait]
impl IdentityProvider for FailingRevoke {
    async fn verify_id_token(&self, id_token: &str) -> Result<DecodedClaims, IdentityError> {
        self.0.verify_id_token(id_token).await
    }

    async fn create_session_cookie(&self, id_token: &str, expires_in: Duration) -> Result<String, IdentityError> {
        self.0.create_session_cookie(id_token, expires_in).await
    }

    async fn verify_session_cookie(&self, token: &str, check_revoked: bool) -> Result<DecodedClaims, IdentityError> {
        self.0.verify_session_cookie(token, check_revoked).await
    }

    async fn set_custom_claims(&self, uid: &str, claims: RoleClaim) -> Result<(), IdentityError> {
        self.0.set_custom_claims(uid, claims).await
    }

    async fn revoke_refresh_tokens(&self, _uid: &str) -> Result<(), IdentityError> {
        Err(IdentityError::Unavailable("revocation endpoint timed out".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Spawned server
// ---------------------------------------------------------------------------

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    /// Run the built server binary on a free port with the memory backend.
    pub fn spawn(staff_uids: &str) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_careorders"))
            .env("APP_ENV", "development")
            .env("CAREORDERS_PORT", port.to_string())
            .env("BIND_ADDRESS", "127.0.0.1")
            .env("STORE_BACKEND", "memory")
            .env("ALLOW_DEV_SIGN_IN", "true")
            .env("STAFF_UIDS", staff_uids)
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        let url = format!("{}/health", self.base_url);
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
