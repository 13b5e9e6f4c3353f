//! HTTP API for sample ingestion, health checks, Prometheus metrics and
//! alert inspection

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use monitor_lib::{
    engine::AlertEngine,
    health::{ComponentStatus, HealthRegistry},
    models::{Context, Severity},
    pipeline::MonitoringPipeline,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub pipeline: MonitoringPipeline,
    pub engine: AlertEngine,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, pipeline: MonitoringPipeline) -> Self {
        let engine = pipeline.engine().clone();
        Self {
            health_registry,
            pipeline,
            engine,
        }
    }
}

/// Returns 200 unless a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %err, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    severity: Option<Severity>,
}

/// Active alerts, newest first
async fn alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> impl IntoResponse {
    Json(state.engine.get_active_alerts(query.severity))
}

/// One metric sample pushed by a producer
#[derive(Debug, Deserialize)]
struct IngestRequest {
    metric_name: String,
    value: f64,
    /// Defaults to the server's current time
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    context: Context,
}

/// Record a sample and return the rule evaluations it produced
async fn ingest_sample(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> impl IntoResponse {
    if request.metric_name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "metric_name must not be empty" })),
        );
    }

    let evaluations = state
        .pipeline
        .ingest(
            &request.metric_name,
            request.value,
            request.timestamp,
            request.tags,
            request.context,
        )
        .await;
    debug!(
        metric_name = %request.metric_name,
        evaluations = evaluations.len(),
        "Sample ingested over HTTP"
    );

    (StatusCode::OK, Json(json!(evaluations)))
}

async fn statistics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.get_statistics())
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/alerts", get(alerts))
        .route("/statistics", get(statistics))
        .route("/samples", post(ingest_sample))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
