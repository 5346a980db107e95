#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;
use vendorhub_api::{
    auth::{AuthConfig, AuthService, RegisterRequest},
    config::AppConfig,
    db,
    events::{self, EventSender},
    handlers::AppServices,
    logging,
    message_queue::InMemoryMessageQueue,
    AppState,
};

const TEST_JWT_SECRET: &str =
    "integration_test_secret_key_that_is_at_least_64_characters_long_0000";

/// Harness that spins up the real application router over a throwaway SQLite
/// database. Each instance gets its own database file so test binaries can
/// run their cases concurrently.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub queue: Arc<InMemoryMessageQueue>,
    pub auth_service: Arc<AuthService>,
    token: String,
    db_file: PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_snapshot_on_read(true).await
    }

    /// Construct a test application, optionally disabling the
    /// snapshot-on-performance-read behavior.
    pub async fn with_snapshot_on_read(snapshot_on_read: bool) -> Self {
        let db_file = std::env::temp_dir().join(format!("vendorhub-test-{}.db", Uuid::new_v4()));
        let database_url = format!("sqlite://{}?mode=rwc", db_file.display());

        let mut cfg = AppConfig::new(
            database_url,
            "redis://127.0.0.1:6379".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.snapshot_on_performance_read = snapshot_on_read;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let queue = Arc::new(InMemoryMessageQueue::new());
        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            queue.clone(),
            logging::discard_logger(),
            cfg.snapshot_on_performance_read,
        );

        let auth_cfg = AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
            Duration::from_secs(cfg.refresh_token_expiration as u64),
        );
        let auth_service = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));

        let redis_client = Arc::new(
            redis::Client::open(cfg.redis_url.clone()).expect("invalid redis url for tests"),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
            redis: redis_client,
        };

        let router = vendorhub_api::build_app(state.clone(), auth_service.clone());

        // A real registered user backs the default bearer token.
        let pair = auth_service
            .register(RegisterRequest {
                name: "Test User".to_string(),
                email: format!("tester-{}@example.com", Uuid::new_v4()),
                password: "integration-password".to_string(),
            })
            .await
            .expect("register default test user");

        Self {
            router,
            state,
            queue,
            auth_service,
            token: pair.access_token,
            db_file,
            _event_task: event_task,
        }
    }

    /// Bearer token for the default registered user.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.token())).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        let _ = std::fs::remove_file(&self.db_file);
    }
}

/// Decode a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Seed a vendor through the API and return its id and body.
pub async fn seed_vendor(app: &TestApp, code: &str) -> (Uuid, Value) {
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/vendors",
            Some(serde_json::json!({
                "name": format!("Vendor {}", code),
                "contact_details": format!("{}@vendors.example", code.to_lowercase()),
                "address": "12 Supply Chain Way",
                "vendor_code": code,
            })),
        )
        .await;
    assert_eq!(response.status(), 201, "vendor seed should succeed");
    let body = response_json(response).await;
    let id = body["id"].as_str().expect("vendor id").parse().unwrap();
    (id, body)
}
