//! Observability infrastructure for the alert monitor
//!
//! Provides:
//! - Prometheus metrics (engine counters, active alerts, evaluation latency, store size)
//! - Structured JSON logging with tracing

use crate::alert::Alert;
use crate::engine::CorrelationGroup;
use prometheus::{register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AlertMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AlertMetricsInner {
    evaluation_latency_seconds: Histogram,
    evaluations: IntCounter,
    alerts_triggered: IntCounter,
    alerts_suppressed: IntCounter,
    notifications_sent: IntCounter,
    notifications_failed: IntCounter,
    correlation_groups: IntCounter,
    escalations_sent: IntCounter,
    active_alerts: IntGauge,
    metric_series: IntGauge,
    metric_samples: IntGauge,
}

impl AlertMetricsInner {
    fn new() -> Self {
        Self {
            evaluation_latency_seconds: register_histogram!(
                "alert_engine_evaluation_latency_seconds",
                "Time spent evaluating alert rules for one metric update",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register evaluation_latency_seconds"),

            evaluations: register_int_counter!(
                "alert_engine_evaluations_total",
                "Total number of alert rule evaluations"
            )
            .expect("Failed to register evaluations"),

            alerts_triggered: register_int_counter!(
                "alert_engine_alerts_triggered_total",
                "Total number of alerts created"
            )
            .expect("Failed to register alerts_triggered"),

            alerts_suppressed: register_int_counter!(
                "alert_engine_alerts_suppressed_total",
                "Total number of triggered evaluations dropped by dedup or suppression"
            )
            .expect("Failed to register alerts_suppressed"),

            notifications_sent: register_int_counter!(
                "alert_engine_notifications_sent_total",
                "Total number of notifications delivered"
            )
            .expect("Failed to register notifications_sent"),

            notifications_failed: register_int_counter!(
                "alert_engine_notifications_failed_total",
                "Total number of notification deliveries that failed"
            )
            .expect("Failed to register notifications_failed"),

            correlation_groups: register_int_counter!(
                "alert_engine_correlation_matches_total",
                "Total number of correlation groups created"
            )
            .expect("Failed to register correlation_groups"),

            escalations_sent: register_int_counter!(
                "alert_engine_escalations_sent_total",
                "Total number of escalation levels fired"
            )
            .expect("Failed to register escalations_sent"),

            active_alerts: register_int_gauge!(
                "alert_engine_active_alerts",
                "Number of alerts currently in the active state"
            )
            .expect("Failed to register active_alerts"),

            metric_series: register_int_gauge!(
                "metric_store_series",
                "Number of metric series held in memory"
            )
            .expect("Failed to register metric_series"),

            metric_samples: register_int_gauge!(
                "metric_store_samples",
                "Number of samples held across all series"
            )
            .expect("Failed to register metric_samples"),
        }
    }
}

/// Alert engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AlertMetrics {
    _private: (),
}

impl Default for AlertMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AlertMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AlertMetricsInner {
        GLOBAL_METRICS.get_or_init(AlertMetricsInner::new)
    }

    pub fn observe_evaluation_latency(&self, duration_secs: f64) {
        self.inner().evaluation_latency_seconds.observe(duration_secs);
    }

    pub fn inc_evaluations(&self) {
        self.inner().evaluations.inc();
    }

    pub fn inc_alerts_triggered(&self) {
        self.inner().alerts_triggered.inc();
    }

    pub fn inc_alerts_suppressed(&self) {
        self.inner().alerts_suppressed.inc();
    }

    pub fn inc_notifications_sent(&self) {
        self.inner().notifications_sent.inc();
    }

    pub fn inc_notifications_failed(&self) {
        self.inner().notifications_failed.inc();
    }

    pub fn inc_correlation_groups(&self, count: u64) {
        self.inner().correlation_groups.inc_by(count);
    }

    pub fn inc_escalations_sent(&self) {
        self.inner().escalations_sent.inc();
    }

    pub fn set_active_alerts(&self, count: i64) {
        self.inner().active_alerts.set(count);
    }

    /// Update metric store size gauges
    pub fn set_store_size(&self, series: i64, samples: i64) {
        self.inner().metric_series.set(series);
        self.inner().metric_samples.set(samples);
    }
}

/// Structured logger for alert lifecycle events
///
/// Provides consistent JSON-formatted logging for alert creation,
/// escalation, correlation and service lifecycle.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Log an alert creation event
    pub fn log_alert_created(&self, alert: &Alert) {
        info!(
            event = "alert_created",
            node = %self.node_name,
            alert_id = %alert.id,
            rule_id = %alert.rule_id,
            rule_name = %alert.rule_name,
            metric_name = %alert.metric_name,
            severity = %alert.severity,
            trigger_value = alert.trigger_value,
            condition = %alert.trigger_condition,
            "Alert created"
        );
    }

    /// Log an escalation that fired
    pub fn log_alert_escalated(&self, alert: &Alert, level: usize, wait_minutes: u64) {
        warn!(
            event = "alert_escalated",
            node = %self.node_name,
            alert_id = %alert.id,
            rule_id = %alert.rule_id,
            severity = %alert.severity,
            escalation_level = level,
            unresolved_minutes = wait_minutes,
            "Alert escalated"
        );
    }

    /// Log a correlation group
    pub fn log_correlation_group(&self, group: &CorrelationGroup) {
        info!(
            event = "correlation_group",
            node = %self.node_name,
            group_id = %group.group_id,
            strategy = group.strategy.as_str(),
            key = %group.key,
            alerts = group.member_alert_ids.len(),
            "Created correlation group"
        );
    }

    /// Log a maintenance pass
    pub fn log_maintenance(&self, expired: usize, removed: usize, active_alerts: usize) {
        info!(
            event = "maintenance",
            node = %self.node_name,
            expired_alerts = expired,
            removed_alerts = removed,
            active_alerts = active_alerts,
            "Maintenance pass complete"
        );
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, rules: usize, channels: usize) {
        info!(
            event = "service_started",
            node = %self.node_name,
            version = %version,
            rules = rules,
            channels = channels,
            "Alert monitor started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Alert monitor shutting down"
        );
    }
}
