//! Alert correlation strategies
//!
//! Each strategy buckets a batch of alerts by a key and turns every bucket
//! that is large enough into a [`CorrelationGroup`]. Strategies run
//! independently, so one alert may land in several groups.

use crate::alert::Alert;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

const DEFAULT_TIME_WINDOW_MINUTES: i64 = 5;
const DEFAULT_MIN_ALERTS: usize = 2;

/// Correlation rule configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CorrelationRule {
    /// Alerts whose trigger times fall in the same window
    Temporal {
        #[serde(default = "default_time_window")]
        time_window_minutes: i64,
        #[serde(default = "default_min_alerts")]
        min_alerts: usize,
    },
    /// Alerts sharing the first segment of the metric name
    MetricBased {
        #[serde(default = "default_min_alerts")]
        min_alerts: usize,
    },
    /// Alerts belonging to the same service
    Dependency {
        #[serde(default = "default_min_alerts")]
        min_alerts: usize,
    },
}

fn default_time_window() -> i64 {
    DEFAULT_TIME_WINDOW_MINUTES
}

fn default_min_alerts() -> usize {
    DEFAULT_MIN_ALERTS
}

impl CorrelationRule {
    /// Temporal, metric-based and dependency correlation with default parameters
    pub fn defaults() -> Vec<CorrelationRule> {
        vec![
            CorrelationRule::Temporal {
                time_window_minutes: DEFAULT_TIME_WINDOW_MINUTES,
                min_alerts: DEFAULT_MIN_ALERTS,
            },
            CorrelationRule::MetricBased {
                min_alerts: DEFAULT_MIN_ALERTS,
            },
            CorrelationRule::Dependency {
                min_alerts: DEFAULT_MIN_ALERTS,
            },
        ]
    }

    pub fn strategy(&self) -> CorrelationStrategy {
        match self {
            CorrelationRule::Temporal { .. } => CorrelationStrategy::Temporal,
            CorrelationRule::MetricBased { .. } => CorrelationStrategy::MetricBased,
            CorrelationRule::Dependency { .. } => CorrelationStrategy::Dependency,
        }
    }

    fn min_alerts(&self) -> usize {
        match self {
            CorrelationRule::Temporal { min_alerts, .. }
            | CorrelationRule::MetricBased { min_alerts }
            | CorrelationRule::Dependency { min_alerts } => *min_alerts,
        }
    }

    fn bucket_key(&self, alert: &Alert, now: DateTime<Utc>) -> String {
        match self {
            CorrelationRule::Temporal {
                time_window_minutes,
                ..
            } => {
                let minutes_ago = (now - alert.triggered_at).num_minutes();
                let bucket = minutes_ago.div_euclid((*time_window_minutes).max(1));
                bucket.to_string()
            }
            CorrelationRule::MetricBased { .. } => alert.metric_family().to_string(),
            CorrelationRule::Dependency { .. } => alert.service().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrategy {
    Temporal,
    MetricBased,
    Dependency,
}

impl CorrelationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationStrategy::Temporal => "temporal",
            CorrelationStrategy::MetricBased => "metric",
            CorrelationStrategy::Dependency => "dependency",
        }
    }
}

/// Alerts judged related by one strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationGroup {
    pub group_id: String,
    pub strategy: CorrelationStrategy,
    /// Bucket the members share (time bucket, metric family or service)
    pub key: String,
    pub member_alert_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl CorrelationGroup {
    pub fn contains(&self, alert_id: &Uuid) -> bool {
        self.member_alert_ids.contains(alert_id)
    }
}

/// Run every rule over `alerts` and return the groups formed.
///
/// Nothing is correlated for batches of fewer than two alerts.
pub fn correlate(
    alerts: &[&Alert],
    rules: &[CorrelationRule],
    now: DateTime<Utc>,
) -> Vec<CorrelationGroup> {
    if alerts.len() < 2 {
        return Vec::new();
    }

    let mut groups = Vec::new();
    for rule in rules {
        let mut buckets: BTreeMap<String, Vec<Uuid>> = BTreeMap::new();
        for alert in alerts {
            buckets
                .entry(rule.bucket_key(alert, now))
                .or_default()
                .push(alert.id);
        }

        let strategy = rule.strategy();
        for (key, members) in buckets {
            if members.len() < rule.min_alerts() {
                continue;
            }
            groups.push(CorrelationGroup {
                group_id: format!("{}_{}_{}", strategy.as_str(), key, Uuid::new_v4().simple()),
                strategy,
                key,
                member_alert_ids: members,
                created_at: now,
            });
        }
    }

    groups
}
