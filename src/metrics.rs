use axum::{http::StatusCode, response::Json, routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

/// Readiness check response.
#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    ready: bool,
}

/// Shared readiness state.
#[derive(Clone, Default)]
pub struct HealthState {
    ready: Arc<AtomicBool>,
}

impl HealthState {
    /// Create a new health state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Mark the service as ready.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    /// Check if the service is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

/// # Errors
///
/// Returns an error if binding the metrics HTTP server fails.
pub async fn start_metrics_server(
    addr: SocketAddr,
    health_state: HealthState,
) -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let started = Instant::now();

    let app = Router::new()
        .route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
        .route("/health", get(move || health_handler(started)))
        .route("/ready", get(move || ready_handler(health_state.clone())));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Health check handler - returns 200 if server is running.
async fn health_handler(started: Instant) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            uptime_secs: started.elapsed().as_secs(),
        }),
    )
}

/// Readiness check handler - returns 200 if ready, 503 if not.
async fn ready_handler(state: HealthState) -> (StatusCode, Json<ReadyResponse>) {
    if state.is_ready() {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                ready: true,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "not ready",
                ready: false,
            }),
        )
    }
}

/// Session count gauges.
pub mod gauges {
    /// Increment the authenticated-sessions gauge.
    pub fn inc_sessions_active() {
        metrics::gauge!("fxqs_sessions_active").increment(1.0);
    }

    /// Decrement the authenticated-sessions gauge.
    pub fn dec_sessions_active() {
        metrics::gauge!("fxqs_sessions_active").decrement(1.0);
    }
}

/// Event counters.
pub mod counters {
    /// Record a login attempt with the given status label.
    pub fn logins_total(status: &'static str) {
        metrics::counter!("fxqs_logins_total", "status" => status).increment(1);
    }

    /// Record a request with the given outcome label.
    pub fn requests_total(status: &'static str) {
        metrics::counter!("fxqs_requests_total", "status" => status).increment(1);
    }

    /// Increment the imposed-lockouts counter.
    pub fn lockouts_total() {
        metrics::counter!("fxqs_lockouts_total").increment(1);
    }
}

/// Latency histograms.
pub mod histograms {
    /// Record a quote-processing latency observation in seconds.
    pub fn request_latency_seconds(value: f64) {
        metrics::histogram!("fxqs_request_latency_seconds").record(value);
    }
}
