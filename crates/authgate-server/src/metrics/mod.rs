//! Prometheus metrics for Authgate
//!
//! Exposes metrics at `/metrics` endpoint in Prometheus format.

use authgate_core::metrics as names;
use authgate_core::{Error, Result};
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Metrics recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    /// Install the process-wide Prometheus recorder
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| Error::InternalError(format!("Failed to install Prometheus recorder: {}", e)))?;

        gauge!(names::INFO, "version" => authgate_core::VERSION).set(1.0);

        Ok(Self {
            handle,
            start_time: Instant::now(),
        })
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());

        self.handle.render()
    }

    /// Record an HTTP request
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        counter!(
            names::HTTP_REQUESTS_TOTAL,
            "method" => method.to_string(),
            "path" => path.to_string(),
            "status" => status.to_string(),
            "status_class" => status_class(status)
        )
        .increment(1);

        histogram!(
            names::HTTP_REQUEST_DURATION_SECONDS,
            "path" => path.to_string()
        )
        .record(duration_secs);
    }
}

fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Only known routes become label values
fn path_label(path: &str) -> &'static str {
    match path {
        "/auth" => "/auth",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "other",
    }
}

/// Axum middleware for recording HTTP metrics
pub async fn metrics_middleware(
    State(metrics): State<Arc<MetricsRecorder>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = path_label(request.uri().path());

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    metrics.record_http_request(&method, path, status, duration);

    debug!(
        method = %method,
        path = %path,
        status = %status,
        duration_ms = %(duration * 1000.0),
        "Request completed"
    );

    response
}

/// Handler for /metrics endpoint
pub async fn metrics_handler(State(metrics): State<Arc<MetricsRecorder>>) -> impl IntoResponse {
    let output = metrics.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}
