use anyhow::Context;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::{AppConfig, SecurityConfig, StoreBackend};
use crate::handlers::{protected, public};
use crate::identity::{IdentityProvider, LocalIdentityProvider};
use crate::middleware::require_session;
use crate::services::staff_registry;
use crate::store::{DocumentStore, MemoryStore, PgDocumentStore};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Collaborators shared by every request.
///
/// Built once at startup and cloned into handlers; there is no other
/// process-wide state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    /// Present only when the development sign-in route is mounted
    pub dev_sign_in: Option<Arc<LocalIdentityProvider>>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            identity,
            dev_sign_in: None,
        }
    }

    pub fn with_dev_sign_in(mut self, provider: Arc<LocalIdentityProvider>) -> Self {
        self.dev_sign_in = Some(provider);
        self
    }

    /// Construct the configured store and identity provider, then seed the
    /// staff registry from `STAFF_UIDS`.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = match config.store.backend {
            StoreBackend::Memory => {
                info!("Using in-memory document store");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Postgres => Arc::new(
                PgDocumentStore::connect(&config.store)
                    .await
                    .context("failed to connect postgres document store")?,
            ),
        };

        for uid in &config.staff_seed {
            staff_registry::register(store.as_ref(), uid, None, None)
                .await
                .with_context(|| format!("failed to seed staff registry entry {}", uid))?;
            info!("Seeded staff registry entry {}", uid);
        }

        let local = Arc::new(LocalIdentityProvider::new(&config.session, store.clone()));
        let allow_dev_sign_in = config.session.allow_dev_sign_in;

        let state = Self::new(config, store, local.clone());
        Ok(if allow_dev_sign_in {
            info!("Development sign-in enabled at /dev/signIn");
            state.with_dev_sign_in(local)
        } else {
            // The local provider only mints ID tokens through /dev/signIn
            warn!(
                "Local identity provider without development sign-in: no client can obtain an ID token \
                 until an external IdentityProvider is plugged into AppState"
            );
            state
        })
    }
}

pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/patient",
            get(protected::patient::patient_get).post(protected::patient::patient_post),
        )
        .route(
            "/medicalStaff",
            get(protected::medical_staff::medical_staff_get)
                .post(protected::medical_staff::medical_staff_post),
        )
        .route("/orders", get(protected::orders::orders_get))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let mut router = Router::new()
        // Public
        .route("/", get(public::pages::home))
        .route("/health", get(public::pages::health))
        .route("/login", get(public::pages::login))
        .route("/unauthorized", get(public::pages::unauthorized))
        // Session lifecycle
        .route("/sessionLogin", post(public::session::session_login))
        .route("/logout", get(public::session::logout))
        // Session-protected
        .merge(protected_routes);

    if state.dev_sign_in.is_some() {
        router = router.route("/dev/signIn", post(public::dev::dev_sign_in));
    }

    if let Some(cors) = cors_layer(&state.config.security) {
        router = router.layer(cors);
    }

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router
        .fallback(public::pages::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
        .with_state(state)
}

fn cors_layer(config: &SecurityConfig) -> Option<CorsLayer> {
    if !config.enable_cors {
        return None;
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_credentials(true),
    )
}
