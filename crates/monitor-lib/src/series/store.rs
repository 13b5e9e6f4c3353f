//! Registry of metric series keyed by metric name

use super::{Anomaly, AnomalyMethod, MetricDefinition, MetricSeries, MetricStatistics};
use crate::clock::{Clock, SystemClock};
use crate::models::MetricSample;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Totals reported by the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub series: usize,
    pub samples: usize,
}

/// Concurrent map of metric name to series
pub struct MetricStore {
    series: DashMap<String, MetricSeries>,
    clock: Arc<dyn Clock>,
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MetricStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            series: DashMap::new(),
            clock,
        }
    }

    /// Register a metric, replacing the definition of an existing series.
    /// Samples already recorded are kept.
    pub fn register_metric(&self, definition: MetricDefinition) {
        let name = definition.name.clone();
        match self.series.get_mut(&name) {
            Some(mut existing) => {
                let samples = existing.query(None, None, None);
                let mut replacement = MetricSeries::new(definition, self.clock.clone());
                for sample in samples {
                    replacement.append_sample(sample);
                }
                *existing = replacement;
            }
            None => {
                self.series
                    .insert(name.clone(), MetricSeries::new(definition, self.clock.clone()));
            }
        }
        debug!(metric = %name, "Registered metric");
    }

    /// Record a sample, creating the series with default settings on first use
    pub fn record_sample(
        &self,
        metric_name: &str,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
        tags: HashMap<String, String>,
        metadata: HashMap<String, serde_json::Value>,
    ) {
        let timestamp = timestamp.unwrap_or_else(|| self.clock.now());
        let mut series = self
            .series
            .entry(metric_name.to_string())
            .or_insert_with(|| {
                MetricSeries::new(MetricDefinition::new(metric_name), self.clock.clone())
            });

        series.append_sample(MetricSample {
            timestamp,
            value,
            tags,
            metadata,
        });
    }

    pub fn contains(&self, metric_name: &str) -> bool {
        self.series.contains_key(metric_name)
    }

    pub fn definition(&self, metric_name: &str) -> Option<MetricDefinition> {
        self.series.get(metric_name).map(|s| s.definition().clone())
    }

    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn query(
        &self,
        metric_name: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        tags_filter: Option<&HashMap<String, String>>,
    ) -> Vec<MetricSample> {
        self.series
            .get(metric_name)
            .map(|s| s.query(start, end, tags_filter))
            .unwrap_or_default()
    }

    pub fn latest_value(&self, metric_name: &str) -> Option<f64> {
        self.series.get(metric_name).and_then(|s| s.latest_value())
    }

    /// Statistics for a metric; an unknown metric yields empty statistics
    pub fn statistics(
        &self,
        metric_name: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> MetricStatistics {
        self.series
            .get_mut(metric_name)
            .map(|mut s| s.statistics(start, end))
            .unwrap_or_default()
    }

    pub fn detect_anomalies(
        &self,
        metric_name: &str,
        method: AnomalyMethod,
        lookback: usize,
    ) -> Vec<Anomaly> {
        self.series
            .get(metric_name)
            .map(|s| s.detect_anomalies(method, lookback))
            .unwrap_or_default()
    }

    pub fn stats(&self) -> StoreStats {
        self.series.iter().fold(StoreStats::default(), |mut acc, entry| {
            acc.series += 1;
            acc.samples += entry.value().len();
            acc
        })
    }
}
