//! Shared fixtures for the router-level tests: the real router over the
//! in-memory store, blob store and dispatcher.

#![allow(dead_code)]

use api_lib::{
    config::{Config, PasswordHashConfig},
    web::{router, AppState},
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use neurostudy_core::memory::{InMemoryBlobStore, InMemoryDatabase, RecordingDispatcher};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Arc<InMemoryDatabase>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        db_max_connections: 1,
        log_level: tracing::Level::DEBUG,
        jwt_secret: JWT_SECRET.to_string(),
        token_ttl_hours: 24,
        token_leeway_secs: 0,
        password_hash: PasswordHashConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        max_upload_bytes: 1024 * 1024,
        cors_allowed_origin: None,
        cloudinary: None,
        ai_worker_url: None,
    }
}

pub fn spawn_app() -> TestApp {
    let db = Arc::new(InMemoryDatabase::new());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = Arc::new(
        AppState::new(
            Arc::new(test_config()),
            db.clone(),
            Arc::new(InMemoryBlobStore::default()),
            dispatcher.clone(),
        )
        .unwrap(),
    );

    TestApp {
        router: router(state.clone()),
        state,
        db,
        dispatcher,
    }
}

impl TestApp {
    /// Sends a request and returns the status with the parsed JSON body
    /// (`Value::Null` for an empty body).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Registers an account through the API and returns `(user_id, token)`.
    pub async fn register(&self, email: &str, password: &str) -> (String, String) {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                serde_json::json!({"email": email, "password": password, "full_name": "Test User"}),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
            body["data"]["token"].as_str().unwrap().to_string(),
        )
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// A single-file multipart body with the given field name and content type.
pub fn multipart_request(
    token: &str,
    field: &str,
    content_type: &str,
    data: &[u8],
) -> Request<Body> {
    const BOUNDARY: &str = "neurostudy-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"note.png\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}
