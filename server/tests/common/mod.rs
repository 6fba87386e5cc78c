//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Json, Router, extract::State, routing::get, routing::post};
use science_explorer_server::inference::InferenceRequest;
use science_explorer_server::server::{AppState, api_routes, ws_handler};
use science_explorer_server::session::SessionConfig;
use science_explorer_server::{InferenceBackend, InferenceError, SessionManager};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Backend that answers `"<mode>: <input>"`, optionally after a delay
pub struct EchoBackend {
    delay: Option<Duration>,
    fail: bool,
    inputs: Mutex<Vec<String>>,
}

impl EchoBackend {
    pub fn new() -> Self {
        Self {
            delay: None,
            fail: false,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceBackend for EchoBackend {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn invoke(&self, request: InferenceRequest<'_>) -> Result<String, InferenceError> {
        self.inputs.lock().unwrap().push(request.input.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(InferenceError::Status {
                status: 500,
                body: "upstream exploded".to_string(),
            });
        }
        Ok(format!("{}: {}", request.instructions.mode(), request.input))
    }
}

/// Create a test application router with state
pub fn create_test_app_with_backend(backend: Arc<dyn InferenceBackend>) -> (Router, AppState) {
    create_test_app_with_config(backend, SessionConfig::default())
}

pub fn create_test_app_with_config(
    backend: Arc<dyn InferenceBackend>,
    config: SessionConfig,
) -> (Router, AppState) {
    let app_state = AppState::new(Arc::new(SessionManager::with_config(backend, config)));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .nest("/api", api_routes())
        .layer(cors)
        .with_state(app_state.clone());

    (app, app_state)
}

/// Create a test application router backed by an [`EchoBackend`]
pub fn create_test_app() -> Router {
    create_test_app_with_backend(Arc::new(EchoBackend::new())).0
}

/// Start a test server on a random port
pub async fn start_test_server(app: Router) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, handle)
}

/// What a fake chat-completions server received
#[derive(Clone, Default)]
pub struct CapturedRequests {
    pub bodies: Arc<Mutex<Vec<serde_json::Value>>>,
    pub auth_headers: Arc<Mutex<Vec<Option<String>>>>,
}

async fn fake_completion(
    State(captured): State<CapturedRequests>,
    headers: axum::http::HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let turn_count = body["messages"].as_array().map(|m| m.len()).unwrap_or(0);
    captured.bodies.lock().unwrap().push(body);
    captured.auth_headers.lock().unwrap().push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );

    Json(serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": format!("reply #{}", turn_count) },
            "finish_reason": "stop"
        }]
    }))
}

/// Start a fake OpenAI-compatible server; returns its base URL
pub async fn start_fake_completions_server() -> (String, CapturedRequests, tokio::task::JoinHandle<()>)
{
    let captured = CapturedRequests::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(fake_completion))
        .route(
            "/broken/chat/completions",
            post(|| async {
                (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    "rate limit exceeded",
                )
            }),
        )
        .with_state(captured.clone());

    let (addr, handle) = start_test_server(app).await;
    (format!("http://{}", addr), captured, handle)
}
