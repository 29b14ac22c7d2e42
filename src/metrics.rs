use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::download_jobs::JobStatus;

/// Metric name prefix for all derivative server metrics
const PREFIX: &str = "derivatives";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_requests_total"), "Create-or-attach requests by artifact type and outcome"),
        &["type", "outcome"]
    ).expect("Failed to create requests_total metric");

    pub static ref GENERATION_TRIGGERS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_generation_triggers_total"), "Generation submissions to the task manager"),
        &["type", "result"]
    ).expect("Failed to create generation_triggers_total metric");

    pub static ref JOBS_SWEPT_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_jobs_swept_total"),
        "Expired jobs removed by the sweeper"
    ).expect("Failed to create jobs_swept_total metric");

    pub static ref NOTIFICATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_notifications_total"), "Observer notifications by job status and result"),
        &["status", "result"]
    ).expect("Failed to create notifications_total metric");

    pub static ref BACKEND_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_backend_errors_total"), "Failed task manager calls"),
        &["operation", "kind"]
    ).expect("Failed to create backend_errors_total metric");

    pub static ref JOBS: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_jobs"), "Persisted jobs by status"),
        &["status"]
    ).expect("Failed to create jobs metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (tests)
    let _ = REGISTRY.register(Box::new(REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(GENERATION_TRIGGERS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_SWEPT_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKEND_ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOBS.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn record_request(artifact_type: &str, outcome: &str) {
    REQUESTS_TOTAL
        .with_label_values(&[artifact_type, outcome])
        .inc();
}

pub fn record_generation_trigger(artifact_type: &str, result: &str) {
    GENERATION_TRIGGERS_TOTAL
        .with_label_values(&[artifact_type, result])
        .inc();
}

pub fn record_jobs_swept(count: usize) {
    JOBS_SWEPT_TOTAL.inc_by(count as f64);
}

pub fn record_notification(status: &str, result: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[status, result]).inc();
}

pub fn record_backend_error(operation: &str, kind: &str) {
    BACKEND_ERRORS_TOTAL
        .with_label_values(&[operation, kind])
        .inc();
}

/// Publish the number of persisted jobs per status.
pub fn set_job_counts(counts: &[(JobStatus, usize)]) {
    JOBS.reset();
    for (status, count) in counts {
        JOBS.with_label_values(&[status.as_db_str()])
            .set(*count as f64);
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Serve `/metrics` on `port` until `shutdown` is cancelled.
pub async fn serve_metrics(port: u16, shutdown: CancellationToken) -> Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", port))?;
    info!("Metrics available at port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Metrics server failed")
}
