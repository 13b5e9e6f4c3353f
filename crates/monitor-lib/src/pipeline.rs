//! Ingestion path tying the metric store to the alert engine

use crate::engine::AlertEngine;
use crate::models::Context;
use crate::rules::Evaluation;
use crate::series::MetricStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Records samples and evaluates the rules bound to their metric
#[derive(Clone)]
pub struct MonitoringPipeline {
    store: Arc<MetricStore>,
    engine: AlertEngine,
}

impl MonitoringPipeline {
    pub fn new(store: Arc<MetricStore>, engine: AlertEngine) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    pub fn engine(&self) -> &AlertEngine {
        &self.engine
    }

    /// Record one sample, then evaluate it against whole-series statistics.
    ///
    /// The caller context is stored as sample metadata and passed on to rule
    /// evaluation.
    pub async fn ingest(
        &self,
        metric_name: &str,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
        tags: HashMap<String, String>,
        context: Context,
    ) -> Vec<Evaluation> {
        let metadata: HashMap<String, serde_json::Value> = context
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.store
            .record_sample(metric_name, value, timestamp, tags, metadata);

        let stats = self.store.statistics(metric_name, None, None);
        let evaluations = self
            .engine
            .evaluate_alerts(metric_name, value, &stats, &context)
            .await;

        debug!(
            metric_name = %metric_name,
            value = value,
            rules = evaluations.len(),
            triggered = evaluations.iter().filter(|e| e.triggered).count(),
            "Ingested sample"
        );
        evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rules::{AlertRule, ComparisonOperator, Condition};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn pipeline() -> (MonitoringPipeline, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(MetricStore::new(clock.clone()));
        let engine = AlertEngine::builder().clock(clock.clone()).build();
        (MonitoringPipeline::new(store, engine), clock)
    }

    #[tokio::test]
    async fn test_ingest_records_and_evaluates() {
        let (pipeline, _clock) = pipeline();
        pipeline.engine().register_alert_rule(AlertRule::new(
            "Queue depth",
            "queue.depth",
            Condition::threshold(ComparisonOperator::Gte, 100.0),
        ));

        let mut context = Context::new();
        context.insert("service".into(), json!("billing"));

        let evaluations = pipeline
            .ingest("queue.depth", 120.0, None, HashMap::new(), context)
            .await;
        assert_eq!(evaluations.len(), 1);
        assert!(evaluations[0].triggered);

        assert_eq!(pipeline.store().latest_value("queue.depth"), Some(120.0));
        let samples = pipeline.store().query("queue.depth", None, None, None);
        assert_eq!(samples[0].metadata["service"], json!("billing"));

        let alerts = pipeline.engine().get_active_alerts(None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].service(), "billing");
    }

    #[tokio::test]
    async fn test_anomaly_rule_uses_series_statistics() {
        let (pipeline, clock) = pipeline();
        pipeline.engine().register_alert_rule(AlertRule::new(
            "Latency anomaly",
            "api.latency",
            Condition::anomaly(2.0),
        ));

        for value in [100.0, 102.0, 98.0, 101.0, 99.0, 100.0] {
            let evaluations = pipeline
                .ingest("api.latency", value, None, HashMap::new(), Context::new())
                .await;
            assert!(!evaluations[0].triggered);
            clock.advance(Duration::minutes(1));
        }

        let evaluations = pipeline
            .ingest("api.latency", 400.0, None, HashMap::new(), Context::new())
            .await;
        assert!(evaluations[0].triggered);
        assert!(evaluations[0].z_score.unwrap() > 2.0);
    }
}
