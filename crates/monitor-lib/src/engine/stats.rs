//! Engine counters, alert history and summary reports

use crate::models::{cutoff_before, AlertStatus, Severity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Compact record kept in the bounded alert history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryRecord {
    Triggered {
        alert_id: Uuid,
        rule_id: String,
        metric_name: String,
        severity: Severity,
        triggered_at: DateTime<Utc>,
        trigger_value: f64,
    },
    /// Written when an alert is resolved or suppressed
    Closed {
        alert_id: Uuid,
        rule_id: String,
        metric_name: String,
        status: AlertStatus,
        triggered_at: DateTime<Utc>,
        resolved_at: DateTime<Utc>,
    },
}

impl HistoryRecord {
    pub fn triggered_at(&self) -> DateTime<Utc> {
        match self {
            HistoryRecord::Triggered { triggered_at, .. }
            | HistoryRecord::Closed { triggered_at, .. } => *triggered_at,
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self, HistoryRecord::Triggered { .. })
    }
}

/// Monotonic engine counters
#[derive(Debug, Default)]
pub struct EngineCounters {
    pub total_evaluations: AtomicU64,
    pub alerts_triggered: AtomicU64,
    pub alerts_suppressed: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub notifications_failed: AtomicU64,
    pub correlation_matches: AtomicU64,
    pub escalations_sent: AtomicU64,
}

impl EngineCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            total_evaluations: self.total_evaluations.load(Ordering::Relaxed),
            alerts_triggered: self.alerts_triggered.load(Ordering::Relaxed),
            alerts_suppressed: self.alerts_suppressed.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            correlation_matches: self.correlation_matches.load(Ordering::Relaxed),
            escalations_sent: self.escalations_sent.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_evaluations: u64,
    pub alerts_triggered: u64,
    pub alerts_suppressed: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub correlation_matches: u64,
    pub escalations_sent: u64,
}

/// Counters plus table sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatistics {
    #[serde(flatten)]
    pub counters: PerformanceMetrics,
    pub registered_rules: usize,
    pub active_alerts: usize,
    pub notification_channels: usize,
    pub correlation_groups: usize,
    pub anomaly_models: usize,
    pub alert_history_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricCount {
    pub metric_name: String,
    pub count: usize,
}

/// Alert activity over a trailing period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertStatistics {
    pub time_period_hours: u32,
    pub total_alerts: usize,
    pub active_alerts: usize,
    pub resolved_alerts: usize,
    pub severity_breakdown: BTreeMap<String, usize>,
    /// Up to ten metrics with the most alerts, busiest first
    pub top_metrics: Vec<MetricCount>,
    pub mean_time_to_resolution_minutes: f64,
    pub alert_rate_per_hour: f64,
    pub correlation_groups: usize,
}

const TOP_METRICS: usize = 10;

impl AlertStatistics {
    /// Summarise history records whose trigger time is within `hours` of `now`
    pub fn from_history<'a>(
        records: impl Iterator<Item = &'a HistoryRecord>,
        hours: u32,
        now: DateTime<Utc>,
        active_alerts: usize,
        correlation_groups: usize,
    ) -> Self {
        let cutoff = cutoff_before(now, Duration::hours(i64::from(hours)));

        let mut total_alerts = 0;
        let mut severity_breakdown: BTreeMap<String, usize> = BTreeMap::new();
        let mut metric_counts: HashMap<String, usize> = HashMap::new();
        let mut resolution_secs = Vec::new();

        for record in records.filter(|r| r.triggered_at() > cutoff) {
            match record {
                HistoryRecord::Triggered {
                    metric_name,
                    severity,
                    ..
                } => {
                    total_alerts += 1;
                    *severity_breakdown.entry(severity.to_string()).or_default() += 1;
                    *metric_counts.entry(metric_name.clone()).or_default() += 1;
                }
                HistoryRecord::Closed {
                    triggered_at,
                    resolved_at,
                    ..
                } => {
                    let elapsed = *resolved_at - *triggered_at;
                    resolution_secs.push(elapsed.num_milliseconds() as f64 / 1000.0);
                }
            }
        }

        let mut top_metrics: Vec<MetricCount> = metric_counts
            .into_iter()
            .map(|(metric_name, count)| MetricCount { metric_name, count })
            .collect();
        top_metrics.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.metric_name.cmp(&b.metric_name))
        });
        top_metrics.truncate(TOP_METRICS);

        let mttr_minutes = if resolution_secs.is_empty() {
            0.0
        } else {
            resolution_secs.iter().sum::<f64>() / resolution_secs.len() as f64 / 60.0
        };

        Self {
            time_period_hours: hours,
            total_alerts,
            active_alerts,
            resolved_alerts: resolution_secs.len(),
            severity_breakdown,
            top_metrics,
            mean_time_to_resolution_minutes: (mttr_minutes * 100.0).round() / 100.0,
            alert_rate_per_hour: if hours > 0 {
                total_alerts as f64 / f64::from(hours)
            } else {
                0.0
            },
            correlation_groups,
        }
    }
}

/// Overall health derived from active alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemHealth {
    Healthy,
    Warning,
    Degraded,
    Critical,
}

/// More than this many active medium alerts is a warning
const MEDIUM_ALERT_WARNING_LEVEL: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: SystemHealth,
    pub active_alerts: usize,
    pub by_severity: BTreeMap<String, usize>,
}

impl HealthSummary {
    pub fn from_active<'a>(severities: impl Iterator<Item = &'a Severity>) -> Self {
        let mut counts: HashMap<Severity, usize> = HashMap::new();
        let mut active_alerts = 0;
        for severity in severities {
            *counts.entry(*severity).or_default() += 1;
            active_alerts += 1;
        }

        let count = |s: Severity| counts.get(&s).copied().unwrap_or(0);
        let status = if count(Severity::Critical) > 0 {
            SystemHealth::Critical
        } else if count(Severity::High) > 0 {
            SystemHealth::Degraded
        } else if count(Severity::Medium) > MEDIUM_ALERT_WARNING_LEVEL {
            SystemHealth::Warning
        } else {
            SystemHealth::Healthy
        };

        Self {
            status,
            active_alerts,
            by_severity: counts
                .into_iter()
                .map(|(severity, n)| (severity.to_string(), n))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
    }

    fn triggered(metric: &str, severity: Severity, minutes_ago: i64) -> HistoryRecord {
        HistoryRecord::Triggered {
            alert_id: Uuid::new_v4(),
            rule_id: "r".into(),
            metric_name: metric.into(),
            severity,
            triggered_at: now() - Duration::minutes(minutes_ago),
            trigger_value: 1.0,
        }
    }

    fn closed(minutes_ago: i64, open_minutes: i64) -> HistoryRecord {
        let triggered_at = now() - Duration::minutes(minutes_ago);
        HistoryRecord::Closed {
            alert_id: Uuid::new_v4(),
            rule_id: "r".into(),
            metric_name: "m".into(),
            status: AlertStatus::Resolved,
            triggered_at,
            resolved_at: triggered_at + Duration::minutes(open_minutes),
        }
    }

    #[test]
    fn test_alert_statistics_window_and_mttr() {
        let history = vec![
            triggered("app.latency", Severity::High, 30),
            triggered("app.latency", Severity::High, 90),
            triggered("app.errors", Severity::Low, 60),
            triggered("app.errors", Severity::Low, 60 * 30),
            closed(60, 10),
            closed(120, 20),
            closed(60 * 48, 999),
        ];

        let stats = AlertStatistics::from_history(history.iter(), 24, now(), 2, 1);
        assert_eq!(stats.total_alerts, 3);
        assert_eq!(stats.resolved_alerts, 2);
        assert_eq!(stats.mean_time_to_resolution_minutes, 15.0);
        assert_eq!(stats.alert_rate_per_hour, 3.0 / 24.0);
        assert_eq!(stats.severity_breakdown["high"], 2);
        assert_eq!(stats.severity_breakdown["low"], 1);
        assert_eq!(stats.top_metrics[0].metric_name, "app.latency");
        assert_eq!(stats.top_metrics[0].count, 2);
        assert_eq!(stats.active_alerts, 2);
        assert_eq!(stats.correlation_groups, 1);
    }

    #[test]
    fn test_zero_hours() {
        let stats = AlertStatistics::from_history(std::iter::empty(), 0, now(), 0, 0);
        assert_eq!(stats.alert_rate_per_hour, 0.0);
        assert_eq!(stats.mean_time_to_resolution_minutes, 0.0);
    }

    #[test]
    fn test_window_beyond_calendar_range_covers_all_history() {
        let history = vec![
            triggered("app.latency", Severity::High, 30),
            triggered("app.errors", Severity::Low, 60 * 24 * 365),
            closed(60, 10),
        ];

        let stats = AlertStatistics::from_history(history.iter(), u32::MAX, now(), 0, 0);
        assert_eq!(stats.total_alerts, 2);
        assert_eq!(stats.resolved_alerts, 1);
        assert!(stats.alert_rate_per_hour > 0.0);
    }

    #[test]
    fn test_health_summary_levels() {
        assert_eq!(
            HealthSummary::from_active([Severity::Low, Severity::Critical].iter()).status,
            SystemHealth::Critical
        );
        assert_eq!(
            HealthSummary::from_active([Severity::High, Severity::Medium].iter()).status,
            SystemHealth::Degraded
        );
        assert_eq!(
            HealthSummary::from_active([Severity::Medium; 6].iter()).status,
            SystemHealth::Warning
        );
        assert_eq!(
            HealthSummary::from_active([Severity::Medium; 5].iter()).status,
            SystemHealth::Healthy
        );
    }

    #[test]
    fn test_counter_snapshot() {
        let counters = EngineCounters::default();
        EngineCounters::incr(&counters.total_evaluations);
        EngineCounters::incr(&counters.total_evaluations);
        EngineCounters::incr(&counters.notifications_failed);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.total_evaluations, 2);
        assert_eq!(snapshot.notifications_failed, 1);
        assert_eq!(snapshot.alerts_triggered, 0);
    }
}
