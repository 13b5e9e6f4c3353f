//! Integration tests for the monitor API endpoints

use alert_monitor::api::{create_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use monitor_lib::{
    engine::AlertEngine,
    health::{components, HealthRegistry},
    models::{Context, Severity},
    observability::AlertMetrics,
    pipeline::MonitoringPipeline,
    rules::{AlertRule, ComparisonOperator, Condition},
    series::{MetricStatistics, MetricStore},
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    for name in components::ALL {
        health_registry.register(name).await;
    }

    let pipeline = MonitoringPipeline::new(Arc::new(MetricStore::default()), AlertEngine::default());
    let state = Arc::new(AppState::new(health_registry, pipeline));
    (create_router(state.clone()), state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_degraded(components::NOTIFIER, "2 notification deliveries failed since last check")
        .await;

    // Degraded still returns 200 (operational)
    let (status, health) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["notifier"]["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_unhealthy(components::ALERT_ENGINE, "state lock poisoned")
        .await;

    let (status, health) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_ready_flag() {
    let (app, state) = setup_test_app().await;

    let (status, readiness) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;
    let (status, readiness) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_engine_metrics() {
    let (app, _state) = setup_test_app().await;
    AlertMetrics::new().set_active_alerts(0);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("alert_engine_active_alerts"));
}

#[tokio::test]
async fn test_alerts_endpoint_filters_by_severity() {
    let (app, state) = setup_test_app().await;
    state.engine.register_alert_rule(
        AlertRule::new(
            "High CPU",
            "system.cpu.usage",
            Condition::threshold(ComparisonOperator::Gt, 90.0),
        )
        .with_severity(Severity::High),
    );
    state
        .engine
        .evaluate_alerts(
            "system.cpu.usage",
            95.0,
            &MetricStatistics::default(),
            &Context::new(),
        )
        .await;

    let (status, alerts) = get(app.clone(), "/alerts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["rule_name"], "High CPU");

    let (_, alerts) = get(app.clone(), "/alerts?severity=critical").await;
    assert!(alerts.as_array().unwrap().is_empty());

    let (_, stats) = get(app, "/statistics").await;
    assert_eq!(stats["registered_rules"], 1);
    assert_eq!(stats["alerts_triggered"], 1);
}

#[tokio::test]
async fn test_posted_sample_is_stored_and_raises_alert() {
    let (app, state) = setup_test_app().await;
    state.engine.register_alert_rule(
        AlertRule::new(
            "Queue backlog",
            "queue.depth",
            Condition::threshold(ComparisonOperator::Gt, 100.0),
        )
        .with_severity(Severity::Critical),
    );

    let (status, evaluations) = post_json(
        app.clone(),
        "/samples",
        json!({
            "metric_name": "queue.depth",
            "value": 250.0,
            "tags": { "queue": "billing" },
            "context": { "service": "billing-worker" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(evaluations.as_array().unwrap().len(), 1);
    assert_eq!(evaluations[0]["triggered"], true);

    assert_eq!(state.pipeline.store().latest_value("queue.depth"), Some(250.0));

    let (_, alerts) = get(app, "/alerts?severity=critical").await;
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["rule_name"], "Queue backlog");
}

#[tokio::test]
async fn test_sample_without_metric_name_is_rejected() {
    let (app, state) = setup_test_app().await;

    let (status, body) =
        post_json(app, "/samples", json!({ "metric_name": " ", "value": 1.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "metric_name must not be empty");
    assert_eq!(state.pipeline.store().latest_value(" "), None);
}
