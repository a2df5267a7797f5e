//! Probe endpoints and Prometheus metrics.
//!
//! Provides:
//! - `/status` - Heartbeat (always returns 200 with an empty body while serving)
//! - `/readyz` - Readiness probe (200 while listening, 503 otherwise)
//! - `/metrics` - Prometheus metrics endpoint
//!
//! The metrics registry lives in [`HealthState`] and is handed to the
//! registrar and the admission server explicitly.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;

/// Heartbeat path
pub const STATUS_PATH: &str = "/status";
/// Readiness path
pub const READYZ_PATH: &str = "/readyz";
/// Metrics path
pub const METRICS_PATH: &str = "/metrics";

/// Labels for admission request metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AdmissionLabels {
    pub kind: String,
    pub operation: String,
    pub outcome: String,
}

impl EncodeLabelSet for AdmissionLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        ("operation", self.operation.as_str()).encode(encoder.encode_label())?;
        ("outcome", self.outcome.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for webhook registration metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct RegistrationLabels {
    pub action: String,
}

impl EncodeLabelSet for RegistrationLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("action", self.action.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Admission requests by kind, operation and outcome
    pub admission_requests_total: Family<AdmissionLabels, Counter>,
    /// Admission handling duration
    pub admission_duration_seconds: Histogram,
    /// Host values rewritten
    pub host_rewrites_total: Counter,
    /// Requests where rules could not be read
    pub transform_degraded_total: Counter,
    /// Webhook configuration creates and updates
    pub webhook_registrations_total: Family<RegistrationLabels, Counter>,
    /// Rules in the most recently read list
    pub transform_rules: Gauge,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_requests_total = Family::<AdmissionLabels, Counter>::default();
        registry.register(
            "muting_admission_requests",
            "Total number of admission requests",
            admission_requests_total.clone(),
        );

        let admission_duration_seconds = Histogram::new(exponential_buckets(0.0005, 2.0, 14));
        registry.register(
            "muting_admission_duration_seconds",
            "Duration of admission request handling in seconds",
            admission_duration_seconds.clone(),
        );

        let host_rewrites_total = Counter::default();
        registry.register(
            "muting_host_rewrites",
            "Total number of Ingress hosts rewritten",
            host_rewrites_total.clone(),
        );

        let transform_degraded_total = Counter::default();
        registry.register(
            "muting_transform_degraded",
            "Total number of requests admitted without rules because they could not be read",
            transform_degraded_total.clone(),
        );

        let webhook_registrations_total = Family::<RegistrationLabels, Counter>::default();
        registry.register(
            "muting_webhook_registrations",
            "Total number of webhook configuration writes",
            webhook_registrations_total.clone(),
        );

        let transform_rules = Gauge::default();
        registry.register(
            "muting_transform_rules",
            "Number of transform rules in the last list read",
            transform_rules.clone(),
        );

        Self {
            admission_requests_total,
            admission_duration_seconds,
            host_rewrites_total,
            transform_degraded_total,
            webhook_registrations_total,
            transform_rules,
            registry,
        }
    }

    /// Record a handled admission request
    pub fn record_admission(&self, kind: &str, operation: &str, outcome: &str, duration_secs: f64) {
        let labels = AdmissionLabels {
            kind: kind.to_string(),
            operation: operation.to_string(),
            outcome: outcome.to_string(),
        };
        self.admission_requests_total.get_or_create(&labels).inc();
        self.admission_duration_seconds.observe(duration_secs);
    }

    /// Record rewritten host values
    pub fn record_host_rewrites(&self, count: usize) {
        self.host_rewrites_total.inc_by(count as u64);
    }

    /// Record a request served without rules
    pub fn record_transform_degraded(&self) {
        self.transform_degraded_total.inc();
    }

    /// Record a webhook configuration create or update
    pub fn record_registration(&self, action: &str) {
        let labels = RegistrationLabels {
            action: action.to_string(),
        };
        self.webhook_registrations_total.get_or_create(&labels).inc();
    }

    /// Update the loaded rule count
    pub fn set_transform_rules(&self, count: usize) {
        self.transform_rules.set(count as i64);
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the probe endpoints
pub struct HealthState {
    /// Whether the server is listening and accepting admission requests
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the server as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the server is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Heartbeat handler
async fn status() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable before listening and while draining.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the probe and metrics router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route(STATUS_PATH, get(status))
        .route(READYZ_PATH, get(readyz))
        .route(METRICS_PATH, get(metrics_handler))
        .with_state(state)
}
