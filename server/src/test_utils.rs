//! Test Utilities Module
//!
//! Scripted inference backend and HTTP helpers for unit tests.
//! This module is only compiled when running tests.

#![cfg(test)]

use crate::inference::{InferenceBackend, InferenceError, InferenceRequest};
use crate::persona::Mode;
use crate::protocol::Turn;
use crate::server::{AppState, api_routes};
use crate::session::SessionManager;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::util::ServiceExt;

// ============================================================================
// Scripted backend
// ============================================================================

/// What the backend was asked, captured per call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub mode: Mode,
    pub directives: &'static [&'static str],
    pub prior_turns: Vec<Turn>,
    pub input: String,
}

/// Inference backend that replays canned results
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    fallback: Result<String, InferenceError>,
    delay: Option<Duration>,
    gate: Option<Semaphore>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    /// Always answer `text`
    pub fn replying(text: &str) -> Self {
        Self::with_fallback(Ok(text.to_string()))
    }

    /// Always fail with `error`
    pub fn failing(error: InferenceError) -> Self {
        Self::with_fallback(Err(error))
    }

    /// Play `results` in order, then keep answering "ok"
    pub fn sequence(results: Vec<Result<String, InferenceError>>) -> Self {
        let backend = Self::with_fallback(Ok("ok".to_string()));
        *backend.script.lock().unwrap() = results.into();
        backend
    }

    fn with_fallback(fallback: Result<String, InferenceError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every call until [`release`](Self::release) is called
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Let one gated call through
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `n` calls have started
    pub async fn wait_for_calls(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.calls.lock().unwrap().len() < n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "Timed out waiting for {} backend calls",
                n
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn invoke(&self, request: InferenceRequest<'_>) -> Result<String, InferenceError> {
        self.calls.lock().unwrap().push(RecordedCall {
            mode: request.instructions.mode(),
            directives: request.instructions.directives(),
            prior_turns: request.prior_turns.to_vec(),
            input: request.input.to_string(),
        });

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("gate semaphore closed")
                .forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Test context that holds the app state and a router over the API routes
pub struct TestContext {
    pub app_state: AppState,
    pub router: Router,
}

impl TestContext {
    /// Create a new test context backed by `backend`
    pub fn new(backend: Arc<ScriptedBackend>) -> Self {
        let app_state = AppState::new(Arc::new(SessionManager::new(backend)));
        let router = Router::new()
            .nest("/api", api_routes())
            .with_state(app_state.clone());
        Self { app_state, router }
    }

    /// Get a reference to the session manager
    pub fn session_manager(&self) -> &Arc<SessionManager> {
        &self.app_state.session_manager
    }

    /// Make an HTTP request to the test router
    pub async fn request(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    /// Send a request with an optional JSON body and parse the JSON response
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, Option<T>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("Failed to serialize body"))
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("Failed to build request");

        let response = self.request(request).await;
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        (status, serde_json::from_slice(&bytes).ok())
    }

    /// Make a GET request and parse JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, uri: &str) -> (StatusCode, Option<T>) {
        self.send_json("GET", uri, None).await
    }

    /// Make a POST request with JSON body and parse JSON response
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Option<T>) {
        self.send_json("POST", uri, Some(body)).await
    }
}
