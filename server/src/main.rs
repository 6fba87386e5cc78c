use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use science_explorer_server::config::Config;
use science_explorer_server::server::{AppState, api_routes, ws_handler};
use science_explorer_server::session::SessionConfig as SessionStateConfig;
use science_explorer_server::{OpenAiCompatibleBackend, SessionManager};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Whether an API key was supplied for the hosted model
static INFERENCE_KEY_SET: std::sync::OnceLock<bool> = std::sync::OnceLock::new();

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    inference: &'static str,
    websocket: &'static str,
    uptime_seconds: u64,
}

async fn health() -> Json<HealthResponse> {
    let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);
    let key_set = INFERENCE_KEY_SET.get().copied().unwrap_or(false);

    Json(HealthResponse {
        status: if key_set { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        inference: if key_set { "configured" } else { "no_api_key" },
        websocket: "ready",
        uptime_seconds: uptime,
    })
}

#[derive(Serialize)]
struct MetricsResponse {
    /// Server uptime in seconds
    uptime_seconds: u64,
    /// Server version
    version: &'static str,
    /// Number of active sessions
    active_sessions: usize,
    /// Total WebSocket connections
    total_connections: usize,
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);

    let (sessions, connections) = state.get_stats().await;

    Json(MetricsResponse {
        uptime_seconds: uptime,
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: sessions,
        total_connections: connections,
    })
}

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Update gauge metrics for sessions and connections (called periodically)
async fn update_gauge_metrics(state: &AppState) {
    let (sessions, connections) = state.get_stats().await;

    metrics::gauge!("science_explorer_sessions_active").set(sessions as f64);
    metrics::gauge!("science_explorer_ws_connections_active").set(connections as f64);

    let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);
    metrics::gauge!("science_explorer_uptime_seconds").set(uptime as f64);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    START_TIME.set(Instant::now()).ok();

    // Must be installed before any metrics are recorded
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    PROMETHEUS_HANDLE.set(prometheus_handle).ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "science_explorer=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Loaded configuration: host={}, port={}",
        config.host, config.port
    );
    info!(
        "Inference: base_url={}, model={}, timeout={:?}",
        config.inference.base_url, config.inference.model, config.inference.timeout
    );

    let key_set = !config.inference.api_key.is_empty();
    INFERENCE_KEY_SET.set(key_set).ok();
    if !key_set {
        warn!("No INFERENCE_API_KEY or GROQ_API_KEY set - requests go out unauthenticated");
    }

    let backend = Arc::new(OpenAiCompatibleBackend::new(&config.inference)?);
    info!("Inference backend ready for model {}", backend.model());

    let session_config = SessionStateConfig {
        idle_timeout: config.session.idle_timeout,
        max_sessions: config.session.max_sessions,
        inference_timeout: config.inference.timeout,
    };
    let session_manager = Arc::new(SessionManager::with_config(backend, session_config));
    let app_state = AppState::new(session_manager);

    // Periodic cleanup for expired sessions
    let cleanup_state = app_state.clone();
    let cleanup_interval = config.session.cleanup_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let removed = cleanup_state.session_manager.cleanup_expired().await;
            if removed > 0 {
                info!("Expired {} idle sessions", removed);
            }
        }
    });

    // Periodic update of gauge metrics (every 5 seconds)
    let metrics_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            update_gauge_metrics(&metrics_state).await;
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .route("/ws", get(ws_handler))
        .nest("/api", api_routes())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Serve the chat front-end if configured
    let app = if let Some(ref static_dir) = config.static_files.dir {
        if static_dir.exists() {
            info!("Serving static files from: {:?}", static_dir);

            // SPA fallback: serve index.html for any unmatched routes
            let index_path = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_path));

            let static_service = ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .service(serve_dir);

            app.fallback_service(static_service)
        } else {
            warn!(
                "Static files directory not found: {:?} - static file serving disabled",
                static_dir
            );
            app
        }
    } else {
        info!("Static file serving disabled (STATIC_FILES_DIR not set)");
        app
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Science Explorer server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
