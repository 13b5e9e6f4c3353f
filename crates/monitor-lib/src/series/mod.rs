//! Retention-bounded metric series
//!
//! This module provides:
//! - Per-metric sample storage with retention pruning
//! - Cached range statistics (mean, spread, median, mode)
//! - Statistical, percentile-threshold and trend anomaly detection

mod anomaly;
mod stats;
mod store;

pub use anomaly::{
    Anomaly, AnomalyDetails, AnomalyMethod, AnomalySeverity, DEFAULT_LOOKBACK,
    MIN_SAMPLES_FOR_DETECTION,
};
pub use stats::{
    mean, median, mode, ols_slope, percentile, quantiles_exclusive, sample_std_dev,
    sample_variance, MetricStatistics,
};
pub use store::{MetricStore, StoreStats};

use crate::clock::Clock;
use crate::models::{cutoff_before, duration_secs, to_chrono, MetricSample};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default sample retention (30 days)
const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default expected sample resolution
const DEFAULT_RESOLUTION: Duration = Duration::from_secs(60);

/// How long a cached statistics snapshot stays valid
const STATS_CACHE_TTL_SECS: i64 = 300;

/// How samples are meant to be rolled up when downsampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    #[default]
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

impl AggregationMethod {
    /// Aggregate a set of values; `None` for an empty set (except count)
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return match self {
                AggregationMethod::Count => Some(0.0),
                _ => None,
            };
        }

        Some(match self {
            AggregationMethod::Avg => mean(values),
            AggregationMethod::Sum => values.iter().sum(),
            AggregationMethod::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregationMethod::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationMethod::Count => values.len() as f64,
        })
    }
}

/// Metric definition used when registering a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
    /// Samples older than this are pruned; zero keeps everything
    #[serde(default = "default_retention", with = "duration_secs", rename = "retention_secs")]
    pub retention: Duration,
    #[serde(default = "default_resolution", with = "duration_secs", rename = "resolution_secs")]
    pub resolution: Duration,
    #[serde(default)]
    pub aggregation: AggregationMethod,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_retention() -> Duration {
    DEFAULT_RETENTION
}

fn default_resolution() -> Duration {
    DEFAULT_RESOLUTION
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            retention: DEFAULT_RETENTION,
            resolution: DEFAULT_RESOLUTION,
            aggregation: AggregationMethod::default(),
            tags: HashMap::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_resolution(mut self, resolution: Duration) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationMethod) -> Self {
        self.aggregation = aggregation;
        self
    }
}

type RangeKey = (Option<DateTime<Utc>>, Option<DateTime<Utc>>);

#[derive(Debug, Clone)]
struct CachedStatistics {
    computed_at: DateTime<Utc>,
    stats: MetricStatistics,
}

/// Samples for one named metric
pub struct MetricSeries {
    definition: MetricDefinition,
    /// Kept sorted by timestamp; equal timestamps keep insertion order
    samples: Vec<MetricSample>,
    stats_cache: HashMap<RangeKey, CachedStatistics>,
    updated_at: Option<DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MetricSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricSeries")
            .field("name", &self.definition.name)
            .field("samples", &self.samples.len())
            .field("cached_ranges", &self.stats_cache.len())
            .finish()
    }
}

impl MetricSeries {
    pub fn new(definition: MetricDefinition, clock: Arc<dyn Clock>) -> Self {
        Self {
            definition,
            samples: Vec::new(),
            stats_cache: HashMap::new(),
            updated_at: None,
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &MetricDefinition {
        &self.definition
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Record a value, defaulting the timestamp to now
    pub fn append(&mut self, value: f64, timestamp: Option<DateTime<Utc>>) {
        let timestamp = timestamp.unwrap_or_else(|| self.clock.now());
        self.append_sample(MetricSample {
            timestamp,
            value,
            tags: HashMap::new(),
            metadata: HashMap::new(),
        });
    }

    /// Record a fully specified sample
    pub fn append_sample(&mut self, sample: MetricSample) {
        let idx = self
            .samples
            .partition_point(|existing| existing.timestamp <= sample.timestamp);
        self.samples.insert(idx, sample);
        self.updated_at = Some(self.clock.now());

        self.stats_cache.clear();
        self.prune_expired();
    }

    /// Drop samples older than the retention window
    fn prune_expired(&mut self) {
        if self.definition.retention.is_zero() {
            return;
        }

        let cutoff = cutoff_before(self.clock.now(), to_chrono(self.definition.retention));
        let expired = self.samples.partition_point(|s| s.timestamp < cutoff);
        if expired > 0 {
            self.samples.drain(..expired);
        }
    }

    /// Samples within `[start, end]` whose tags match every filter entry
    pub fn query(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        tags_filter: Option<&HashMap<String, String>>,
    ) -> Vec<MetricSample> {
        self.range(start, end)
            .iter()
            .filter(|s| tags_filter.map_or(true, |filter| s.matches_tags(filter)))
            .cloned()
            .collect()
    }

    fn range(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> &[MetricSample] {
        let lo = start.map_or(0, |start| self.samples.partition_point(|s| s.timestamp < start));
        let hi = end.map_or(self.samples.len(), |end| {
            self.samples.partition_point(|s| s.timestamp <= end)
        });

        if lo >= hi {
            return &[];
        }
        &self.samples[lo..hi]
    }

    /// Value of the most recent sample
    pub fn latest_value(&self) -> Option<f64> {
        self.samples.last().map(|s| s.value)
    }

    /// Range statistics, served from cache for up to five minutes
    pub fn statistics(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> MetricStatistics {
        let now = self.clock.now();
        let key = (start, end);

        if let Some(cached) = self.stats_cache.get(&key) {
            if now - cached.computed_at < ChronoDuration::seconds(STATS_CACHE_TTL_SECS) {
                return cached.stats.clone();
            }
        }

        let stats = MetricStatistics::compute(self.range(start, end));
        self.stats_cache.insert(
            key,
            CachedStatistics {
                computed_at: now,
                stats: stats.clone(),
            },
        );
        stats
    }

    /// Run an anomaly detector over the most recent `lookback` samples
    pub fn detect_anomalies(&self, method: AnomalyMethod, lookback: usize) -> Vec<Anomaly> {
        anomaly::detect(&self.samples, method, lookback)
    }

    /// Aggregate values in `[start, end]` using the series' aggregation method
    pub fn aggregate(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Option<f64> {
        let values: Vec<f64> = self.range(start, end).iter().map(|s| s.value).collect();
        self.definition.aggregation.apply(&values)
    }

    #[cfg(test)]
    fn cached_ranges(&self) -> usize {
        self.stats_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn make_series(retention: Duration) -> (MetricSeries, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let definition = MetricDefinition::new("system.cpu.usage")
            .with_unit("percent")
            .with_retention(retention);
        (MetricSeries::new(definition, clock.clone()), clock)
    }

    #[test]
    fn test_append_defaults_timestamp_to_now() {
        let (mut series, _clock) = make_series(DEFAULT_RETENTION);
        series.append(42.0, None);

        let samples = series.query(None, None, None);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, start());
        assert_eq!(series.latest_value(), Some(42.0));
    }

    #[test]
    fn test_out_of_order_inserts_read_sorted() {
        let (mut series, _clock) = make_series(DEFAULT_RETENTION);
        series.append(3.0, Some(start() - ChronoDuration::minutes(1)));
        series.append(1.0, Some(start() - ChronoDuration::minutes(3)));
        series.append(2.0, Some(start() - ChronoDuration::minutes(2)));

        let values: Vec<f64> = series.query(None, None, None).iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(series.latest_value(), Some(3.0));
    }

    #[test]
    fn test_retention_prunes_old_samples() {
        let (mut series, clock) = make_series(Duration::from_secs(3600));
        series.append(1.0, Some(start() - ChronoDuration::minutes(90)));
        series.append(2.0, Some(start() - ChronoDuration::minutes(30)));
        assert_eq!(series.len(), 1);

        clock.advance(ChronoDuration::minutes(45));
        series.append(3.0, None);

        let values: Vec<f64> = series.query(None, None, None).iter().map(|s| s.value).collect();
        assert_eq!(values, vec![3.0]);
    }

    #[test]
    fn test_zero_retention_keeps_everything() {
        let (mut series, _clock) = make_series(Duration::ZERO);
        series.append(1.0, Some(start() - ChronoDuration::days(365)));
        series.append(2.0, None);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_huge_retention_keeps_everything() {
        let (mut series, _clock) = make_series(Duration::from_secs(u64::MAX));
        series.append(1.0, Some(start() - ChronoDuration::days(365 * 50)));
        series.append(2.0, None);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_query_range_and_tags() {
        let (mut series, _clock) = make_series(DEFAULT_RETENTION);
        for i in 0..5 {
            let mut tags = HashMap::new();
            tags.insert("host".to_string(), format!("web-{}", i % 2));
            series.append_sample(MetricSample {
                timestamp: start() - ChronoDuration::minutes(10 - i),
                value: i as f64,
                tags,
                metadata: HashMap::new(),
            });
        }

        let inclusive = series.query(
            Some(start() - ChronoDuration::minutes(9)),
            Some(start() - ChronoDuration::minutes(7)),
            None,
        );
        assert_eq!(
            inclusive.iter().map(|s| s.value).collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0]
        );

        let mut filter = HashMap::new();
        filter.insert("host".to_string(), "web-0".to_string());
        let tagged = series.query(None, None, Some(&filter));
        assert_eq!(
            tagged.iter().map(|s| s.value).collect::<Vec<_>>(),
            vec![0.0, 2.0, 4.0]
        );
    }

    #[test]
    fn test_statistics_cache_ttl_and_invalidation() {
        let (mut series, clock) = make_series(DEFAULT_RETENTION);
        series.append(10.0, None);
        series.append(20.0, None);

        let first = series.statistics(None, None);
        assert_eq!(first.count, 2);
        assert_eq!(series.cached_ranges(), 1);

        // Cached result survives until the TTL elapses
        clock.advance(ChronoDuration::seconds(299));
        assert_eq!(series.statistics(None, None), first);

        // Insert clears every cached range
        series.append(30.0, None);
        assert_eq!(series.cached_ranges(), 0);
        assert_eq!(series.statistics(None, None).count, 3);
    }

    #[test]
    fn test_statistics_cache_expires() {
        let (mut series, clock) = make_series(Duration::ZERO);
        series.append(10.0, Some(start()));
        series.append(20.0, Some(start()));
        let _ = series.statistics(None, Some(start()));

        clock.advance(ChronoDuration::seconds(301));
        let refreshed = series.statistics(None, Some(start()));
        assert_eq!(refreshed.count, 2);
        assert_eq!(series.cached_ranges(), 1);
    }

    #[test]
    fn test_empty_range_statistics() {
        let (mut series, _clock) = make_series(DEFAULT_RETENTION);
        let stats = series.statistics(None, None);
        assert_eq!(stats.count, 0);
        assert!(stats.last_timestamp.is_none());
    }

    #[test]
    fn test_detect_anomalies_on_series() {
        let (mut series, _clock) = make_series(DEFAULT_RETENTION);
        for i in 0..10 {
            let value = if i == 9 { 95.0 } else { 10.0 };
            series.append(value, Some(start() - ChronoDuration::minutes(10 - i)));
        }

        let anomalies = series.detect_anomalies(AnomalyMethod::Statistical, DEFAULT_LOOKBACK);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].value, Some(95.0));
    }

    #[test]
    fn test_aggregation_methods() {
        let values = [1.0, 2.0, 6.0];
        assert_eq!(AggregationMethod::Avg.apply(&values), Some(3.0));
        assert_eq!(AggregationMethod::Sum.apply(&values), Some(9.0));
        assert_eq!(AggregationMethod::Min.apply(&values), Some(1.0));
        assert_eq!(AggregationMethod::Max.apply(&values), Some(6.0));
        assert_eq!(AggregationMethod::Count.apply(&values), Some(3.0));
        assert_eq!(AggregationMethod::Avg.apply(&[]), None);
        assert_eq!(AggregationMethod::Count.apply(&[]), Some(0.0));
    }
}
