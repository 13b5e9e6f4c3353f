//! Alert evaluation engine
//!
//! This module provides:
//! - Rule registration and per-metric evaluation fan-out
//! - The create-alert pipeline (dedup, suppression, history, notification)
//! - Correlation of alerts created in the same batch
//! - Escalation timers that re-check the alert when they wake
//!
//! All mutable state lives in one [`EngineState`] behind a single mutex.
//! The lock is never held across an await: notifications and escalations
//! are spawned onto the runtime after it is released.

mod correlation;
mod escalation;
mod notify;
mod stats;


pub use correlation::{correlate, CorrelationGroup, CorrelationRule, CorrelationStrategy};
pub use notify::{dashboard_url, ChannelConfig, ChannelType, Notification, NotificationService};
pub use stats::{
    AlertStatistics, EngineCounters, EngineStatistics, HealthSummary, HistoryRecord, MetricCount,
    PerformanceMetrics, SystemHealth,
};

use crate::alert::{Alert, AnnotationKind};
use crate::buffer::BoundedBuffer;
use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, Result};
use crate::models::{cutoff_before, duration_secs, to_chrono, AlertStatus, Context, Severity};
use crate::observability::{AlertMetrics, StructuredLogger};
use crate::rules::{AlertRule, ConditionKind, EscalationLevel, Evaluation, TimeWindow};
use crate::series::{AnomalyMethod, MetricStatistics};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Engine tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// An Active alert for the same rule inside this window absorbs new triggers
    #[serde(with = "duration_secs", rename = "dedup_window_secs")]
    pub dedup_window: Duration,
    /// Window used to measure recent alert volume
    #[serde(with = "duration_secs", rename = "volume_window_secs")]
    pub volume_window: Duration,
    /// Above this many recent alerts every new alert is suppressed
    pub global_suppression_limit: usize,
    /// Above this many recent alerts low and medium alerts are suppressed
    pub low_priority_suppression_limit: usize,
    pub history_capacity: usize,
    pub baseline_capacity: usize,
    /// Daily windows during which no alert is created
    pub maintenance_windows: Vec<TimeWindow>,
    pub correlation_rules: Vec<CorrelationRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_secs(5 * 60),
            volume_window: Duration::from_secs(10 * 60),
            global_suppression_limit: 50,
            low_priority_suppression_limit: 20,
            history_capacity: 10_000,
            baseline_capacity: 1_000,
            maintenance_windows: Vec::new(),
            correlation_rules: CorrelationRule::defaults(),
        }
    }
}

/// Per-rule model kept for anomaly rules.
///
/// Evaluated values are appended to the baseline; evaluation never reads it.
#[derive(Debug, Clone)]
pub struct AnomalyModel {
    pub rule_id: String,
    pub method: AnomalyMethod,
    pub sensitivity: f64,
    pub lookback_points: usize,
    pub baseline: BoundedBuffer<f64>,
}

impl AnomalyModel {
    fn for_rule(rule: &AlertRule, capacity: usize) -> Option<Self> {
        match &rule.condition.kind {
            ConditionKind::Anomaly {
                detection_method,
                sensitivity,
                lookback_points,
                ..
            } => Some(Self {
                rule_id: rule.id.clone(),
                method: *detection_method,
                sensitivity: *sensitivity,
                lookback_points: *lookback_points,
                baseline: BoundedBuffer::new(capacity),
            }),
            _ => None,
        }
    }
}

enum PipelineOutcome {
    Created(Alert),
    Duplicate,
    Suppressed(&'static str),
}

/// Work to perform once the state lock is released
struct Dispatch {
    alert: Alert,
    targets: Vec<(String, ChannelConfig)>,
    escalation: Vec<EscalationLevel>,
}

struct EngineState {
    rules: BTreeMap<String, AlertRule>,
    active_alerts: HashMap<Uuid, Alert>,
    groups: BTreeMap<String, CorrelationGroup>,
    history: BoundedBuffer<HistoryRecord>,
    anomaly_models: HashMap<String, AnomalyModel>,
    channels: HashMap<String, ChannelConfig>,
}

impl EngineState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            rules: BTreeMap::new(),
            active_alerts: HashMap::new(),
            groups: BTreeMap::new(),
            history: BoundedBuffer::new(config.history_capacity),
            anomaly_models: HashMap::new(),
            channels: HashMap::new(),
        }
    }

    fn active_count(&self) -> usize {
        self.active_alerts.values().filter(|a| a.is_active()).count()
    }

    fn is_duplicate(&self, rule_id: &str, now: DateTime<Utc>, window: ChronoDuration) -> bool {
        let cutoff = cutoff_before(now, window);
        self.active_alerts
            .values()
            .any(|a| a.rule_id == rule_id && a.is_active() && a.triggered_at > cutoff)
    }

    fn recent_alert_count(&self, now: DateTime<Utc>, window: ChronoDuration) -> usize {
        let cutoff = cutoff_before(now, window);
        self.history
            .iter()
            .filter(|r| r.is_triggered() && r.triggered_at() > cutoff)
            .count()
    }

    fn suppression_reason(
        &self,
        rule: &AlertRule,
        evaluation: &Evaluation,
        now: DateTime<Utc>,
        config: &EngineConfig,
    ) -> Option<&'static str> {
        if config.maintenance_windows.iter().any(|w| w.is_active(now)) {
            return Some("maintenance window");
        }

        if rule.is_suppressed(&evaluation.suppression_context(), now) {
            return Some("rule suppression condition");
        }

        let recent = self.recent_alert_count(now, to_chrono(config.volume_window));
        if recent > config.global_suppression_limit {
            return Some("global alert volume");
        }
        if rule.severity.is_low_priority() && recent > config.low_priority_suppression_limit {
            return Some("alert volume for low priority severity");
        }

        None
    }

    fn create_alert(
        &mut self,
        rule: &AlertRule,
        evaluation: &Evaluation,
        now: DateTime<Utc>,
        config: &EngineConfig,
    ) -> PipelineOutcome {
        if self.is_duplicate(&rule.id, now, to_chrono(config.dedup_window)) {
            return PipelineOutcome::Duplicate;
        }
        if let Some(reason) = self.suppression_reason(rule, evaluation, now, config) {
            return PipelineOutcome::Suppressed(reason);
        }

        let alert = Alert::from_evaluation(rule, evaluation, rule.render_message(evaluation), now);
        self.history.push(HistoryRecord::Triggered {
            alert_id: alert.id,
            rule_id: rule.id.clone(),
            metric_name: rule.metric_name.clone(),
            severity: rule.severity,
            triggered_at: alert.triggered_at,
            trigger_value: alert.trigger_value,
        });
        self.active_alerts.insert(alert.id, alert.clone());

        PipelineOutcome::Created(alert)
    }

    fn record_closed(&mut self, alert: &Alert, now: DateTime<Utc>) {
        self.history.push(HistoryRecord::Closed {
            alert_id: alert.id,
            rule_id: alert.rule_id.clone(),
            metric_name: alert.metric_name.clone(),
            status: alert.status,
            triggered_at: alert.triggered_at,
            resolved_at: alert.resolved_at.unwrap_or(now),
        });
    }

    /// Registered channels for `ids`; unknown ids are skipped
    fn resolve_channels(&self, ids: &[String]) -> Vec<(String, ChannelConfig)> {
        ids.iter()
            .filter_map(|id| match self.channels.get(id) {
                Some(channel) => Some((id.clone(), channel.clone())),
                None => {
                    warn!(channel_id = %id, "Notification channel not registered, skipping");
                    None
                }
            })
            .collect()
    }

    fn alert_mut(&mut self, alert_id: Uuid) -> Result<&mut Alert> {
        self.active_alerts
            .get_mut(&alert_id)
            .ok_or(EngineError::AlertNotFound(alert_id))
    }
}

struct EngineInner {
    state: Mutex<EngineState>,
    counters: EngineCounters,
    notifier: Option<Arc<dyn NotificationService>>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    metrics: AlertMetrics,
    logger: StructuredLogger,
}

/// Builder for [`AlertEngine`]
pub struct AlertEngineBuilder {
    config: EngineConfig,
    notifier: Option<Arc<dyn NotificationService>>,
    clock: Arc<dyn Clock>,
    node_name: String,
}

impl Default for AlertEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            notifier: None,
            clock: Arc::new(SystemClock),
            node_name: "alert-monitor".to_string(),
        }
    }
}

impl AlertEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationService>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    pub fn build(self) -> AlertEngine {
        AlertEngine {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState::new(&self.config)),
                counters: EngineCounters::default(),
                notifier: self.notifier,
                clock: self.clock,
                config: self.config,
                metrics: AlertMetrics::new(),
                logger: StructuredLogger::new(self.node_name),
            }),
        }
    }
}

/// Shared handle to the alert engine; clones refer to the same engine
#[derive(Clone)]
pub struct AlertEngine {
    inner: Arc<EngineInner>,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AlertEngine {
    pub fn builder() -> AlertEngineBuilder {
        AlertEngineBuilder::default()
    }

    pub fn new(config: EngineConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock.clone()
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    // -- rule management --

    /// Register (or replace) a rule
    pub fn register_alert_rule(&self, rule: AlertRule) {
        let mut state = self.state();
        self.install_rule(&mut state, rule);
    }

    /// Replace a registered rule
    pub fn update_alert_rule(&self, rule: AlertRule) -> Result<()> {
        let mut state = self.state();
        if !state.rules.contains_key(&rule.id) {
            return Err(EngineError::RuleNotFound(rule.id));
        }
        self.install_rule(&mut state, rule);
        Ok(())
    }

    fn install_rule(&self, state: &mut EngineState, rule: AlertRule) {
        match AnomalyModel::for_rule(&rule, self.inner.config.baseline_capacity) {
            Some(model) => {
                info!(rule_id = %rule.id, method = ?model.method, "Initialized anomaly model");
                state.anomaly_models.insert(rule.id.clone(), model);
            }
            None => {
                state.anomaly_models.remove(&rule.id);
            }
        }

        info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            metric_name = %rule.metric_name,
            "Registered alert rule"
        );
        state.rules.insert(rule.id.clone(), rule);
    }

    /// Remove a rule and its anomaly model
    pub fn unregister_alert_rule(&self, rule_id: &str) -> Result<AlertRule> {
        let mut state = self.state();
        let rule = state
            .rules
            .remove(rule_id)
            .ok_or_else(|| EngineError::RuleNotFound(rule_id.to_string()))?;
        state.anomaly_models.remove(rule_id);

        info!(rule_id = %rule.id, rule_name = %rule.name, "Unregistered alert rule");
        Ok(rule)
    }

    pub fn rule(&self, rule_id: &str) -> Option<AlertRule> {
        self.state().rules.get(rule_id).cloned()
    }

    pub fn rules(&self) -> Vec<AlertRule> {
        self.state().rules.values().cloned().collect()
    }

    /// Values appended to an anomaly rule's baseline, oldest first
    pub fn anomaly_baseline(&self, rule_id: &str) -> Option<Vec<f64>> {
        self.state()
            .anomaly_models
            .get(rule_id)
            .map(|m| m.baseline.iter().copied().collect())
    }

    pub fn register_notification_channel(&self, channel_id: impl Into<String>, channel: ChannelConfig) {
        let channel_id = channel_id.into();
        info!(
            channel_id = %channel_id,
            channel_type = %channel.channel_type,
            "Registered notification channel"
        );
        self.state().channels.insert(channel_id, channel);
    }

    /// Remove a channel; rules still naming it skip it from then on
    pub fn unregister_notification_channel(&self, channel_id: &str) -> Result<ChannelConfig> {
        let channel = self
            .state()
            .channels
            .remove(channel_id)
            .ok_or_else(|| EngineError::ChannelNotFound(channel_id.to_string()))?;

        info!(channel_id = %channel_id, "Unregistered notification channel");
        Ok(channel)
    }

    // -- evaluation --

    /// Evaluate every enabled rule bound to `metric_name`.
    ///
    /// Returns one evaluation per matching rule. Notifications and
    /// escalations for created alerts are spawned onto the runtime.
    pub async fn evaluate_alerts(
        &self,
        metric_name: &str,
        value: f64,
        stats: &MetricStatistics,
        context: &Context,
    ) -> Vec<Evaluation> {
        let started = Instant::now();
        let now = self.now();
        let counters = &self.inner.counters;
        let metrics = &self.inner.metrics;
        let mut dispatches = Vec::new();

        let evaluations = {
            let mut state = self.state();
            let rule_ids: Vec<String> = state
                .rules
                .values()
                .filter(|r| r.enabled && r.metric_name == metric_name)
                .map(|r| r.id.clone())
                .collect();

            let mut evaluations = Vec::with_capacity(rule_ids.len());
            let mut created = Vec::new();

            for rule_id in rule_ids {
                let Some(rule) = state.rules.get_mut(&rule_id) else {
                    continue;
                };
                let evaluation = rule.evaluate(value, stats, context, now);
                let rule = rule.clone();

                EngineCounters::incr(&counters.total_evaluations);
                metrics.inc_evaluations();

                if let Some(model) = state.anomaly_models.get_mut(&rule_id) {
                    model.baseline.push(value);
                }

                if evaluation.triggered {
                    match state.create_alert(&rule, &evaluation, now, &self.inner.config) {
                        PipelineOutcome::Created(alert) => {
                            EngineCounters::incr(&counters.alerts_triggered);
                            metrics.inc_alerts_triggered();
                            self.inner.logger.log_alert_created(&alert);

                            created.push(alert.id);
                            dispatches.push(Dispatch {
                                targets: state.resolve_channels(&rule.notification_channel_ids),
                                escalation: rule.escalation_policy.clone(),
                                alert,
                            });
                        }
                        PipelineOutcome::Duplicate => {
                            debug!(rule_id = %rule.id, "Discarding duplicate alert");
                            EngineCounters::incr(&counters.alerts_suppressed);
                            metrics.inc_alerts_suppressed();
                        }
                        PipelineOutcome::Suppressed(reason) => {
                            debug!(rule_id = %rule.id, reason, "Alert suppressed");
                            EngineCounters::incr(&counters.alerts_suppressed);
                            metrics.inc_alerts_suppressed();
                        }
                    }
                }

                evaluations.push(evaluation);
            }

            if created.len() >= 2 {
                let groups = {
                    let batch: Vec<&Alert> = created
                        .iter()
                        .filter_map(|id| state.active_alerts.get(id))
                        .collect();
                    correlate(&batch, &self.inner.config.correlation_rules, now)
                };
                self.store_groups(&mut state, groups);
            }

            metrics.set_active_alerts(state.active_count() as i64);
            evaluations
        };

        for dispatch in dispatches {
            self.dispatch(dispatch);
        }

        metrics.observe_evaluation_latency(started.elapsed().as_secs_f64());
        evaluations
    }

    fn store_groups(&self, state: &mut EngineState, groups: Vec<CorrelationGroup>) {
        if groups.is_empty() {
            return;
        }

        self.inner.metrics.inc_correlation_groups(groups.len() as u64);
        for group in groups {
            EngineCounters::incr(&self.inner.counters.correlation_matches);
            self.inner.logger.log_correlation_group(&group);
            state.groups.insert(group.group_id.clone(), group);
        }
    }

    fn dispatch(&self, dispatch: Dispatch) {
        let Dispatch {
            alert,
            targets,
            escalation,
        } = dispatch;

        if let Some(notifier) = self.inner.notifier.clone() {
            if !targets.is_empty() {
                let engine = self.clone();
                let alert = alert.clone();
                tokio::spawn(async move {
                    for (channel_id, channel) in targets {
                        let notification = Notification::for_alert(&alert, &channel);
                        engine
                            .deliver(notifier.as_ref(), &channel_id, notification)
                            .await;
                    }
                });
            }
        }

        for (level_index, level) in escalation.into_iter().enumerate() {
            self.schedule_escalation(alert.id, level_index, level);
        }
    }

    /// Send one notification, counting the outcome
    async fn deliver(
        &self,
        notifier: &dyn NotificationService,
        channel_id: &str,
        notification: Notification,
    ) -> bool {
        let recipient = notification.recipient.clone();
        match notifier.send_notification(notification).await {
            Ok(()) => {
                EngineCounters::incr(&self.inner.counters.notifications_sent);
                self.inner.metrics.inc_notifications_sent();
                true
            }
            Err(err) => {
                warn!(
                    channel_id = %channel_id,
                    recipient = %recipient,
                    error = %err,
                    "Failed to send notification"
                );
                EngineCounters::incr(&self.inner.counters.notifications_failed);
                self.inner.metrics.inc_notifications_failed();
                false
            }
        }
    }

    /// Correlate a set of existing alerts and keep the resulting groups
    pub fn correlate(&self, alert_ids: &[Uuid]) -> Result<Vec<CorrelationGroup>> {
        let now = self.now();
        let mut state = self.state();

        let groups = {
            let mut batch = Vec::with_capacity(alert_ids.len());
            for id in alert_ids {
                let alert = state
                    .active_alerts
                    .get(id)
                    .ok_or(EngineError::AlertNotFound(*id))?;
                batch.push(alert);
            }
            correlate(&batch, &self.inner.config.correlation_rules, now)
        };

        self.store_groups(&mut state, groups.clone());
        Ok(groups)
    }

    pub fn correlation_groups(&self) -> Vec<CorrelationGroup> {
        self.state().groups.values().cloned().collect()
    }

    // -- alert lifecycle --

    /// Force an alert's status. Returns false when the alert is unknown.
    ///
    /// Resolved and Suppressed write a closing history record; the alert
    /// stays in the table until cleanup.
    pub fn update_alert_status(&self, alert_id: Uuid, new_status: AlertStatus) -> bool {
        let now = self.now();
        let mut state = self.state();
        let Some(alert) = state.active_alerts.get_mut(&alert_id) else {
            return false;
        };

        let changed = alert.status != new_status;
        alert.status = new_status;
        if new_status == AlertStatus::Resolved && alert.resolved_at.is_none() {
            alert.resolved_at = Some(now);
        }
        let alert = alert.clone();

        // Repeated transitions into a closed status are recorded once
        if changed && matches!(new_status, AlertStatus::Resolved | AlertStatus::Suppressed) {
            state.record_closed(&alert, now);
        }
        self.inner.metrics.set_active_alerts(state.active_count() as i64);

        debug!(alert_id = %alert_id, status = %new_status, "Alert status updated");
        true
    }

    /// Acknowledge an alert. `Ok(false)` when it is not Active.
    pub fn acknowledge_alert(&self, alert_id: Uuid, by: &str, note: Option<&str>) -> Result<bool> {
        let now = self.now();
        let mut state = self.state();
        let changed = state.alert_mut(alert_id)?.acknowledge(by, note, now);
        self.inner.metrics.set_active_alerts(state.active_count() as i64);
        Ok(changed)
    }

    /// Resolve an alert. `Ok(false)` when it is neither Active nor Acknowledged.
    pub fn resolve_alert(&self, alert_id: Uuid, by: &str, note: Option<&str>) -> Result<bool> {
        let now = self.now();
        let mut state = self.state();
        let alert = state.alert_mut(alert_id)?;
        if !alert.resolve(by, note, now) {
            return Ok(false);
        }

        let alert = alert.clone();
        state.record_closed(&alert, now);
        self.inner.metrics.set_active_alerts(state.active_count() as i64);
        Ok(true)
    }

    /// Suppress an Active alert by hand. `Ok(false)` in any other state.
    pub fn suppress_alert(&self, alert_id: Uuid, reason: Option<&str>) -> Result<bool> {
        let now = self.now();
        let mut state = self.state();
        let alert = state.alert_mut(alert_id)?;
        if !alert.suppress(reason, now) {
            return Ok(false);
        }

        let alert = alert.clone();
        state.record_closed(&alert, now);
        self.inner.metrics.set_active_alerts(state.active_count() as i64);
        Ok(true)
    }

    pub fn assign_alert(&self, alert_id: Uuid, assignee: &str) -> Result<()> {
        self.state().alert_mut(alert_id)?.assign(assignee);
        Ok(())
    }

    pub fn comment_on_alert(&self, alert_id: Uuid, author: &str, content: &str) -> Result<()> {
        let now = self.now();
        self.state()
            .alert_mut(alert_id)?
            .add_annotation(AnnotationKind::Comment, content, author, now);
        Ok(())
    }

    pub fn get_alert(&self, alert_id: Uuid) -> Option<Alert> {
        self.state().active_alerts.get(&alert_id).cloned()
    }

    /// Active alerts, newest first
    pub fn get_active_alerts(&self, severity: Option<Severity>) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .state()
            .active_alerts
            .values()
            .filter(|a| a.is_active())
            .filter(|a| severity.map_or(true, |s| a.severity == s))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        alerts
    }

    // -- maintenance --

    /// Drop Resolved/Expired alerts triggered more than `days` ago, then any
    /// correlation group with no remaining members. Returns alerts removed.
    pub fn cleanup_old_data(&self, days: u32) -> usize {
        let cutoff = cutoff_before(self.now(), ChronoDuration::days(i64::from(days)));
        let mut state = self.state();

        let before = state.active_alerts.len();
        state.active_alerts.retain(|_, alert| {
            !(matches!(alert.status, AlertStatus::Resolved | AlertStatus::Expired)
                && alert.triggered_at < cutoff)
        });
        let removed = before - state.active_alerts.len();

        let EngineState {
            groups,
            active_alerts,
            ..
        } = &mut *state;
        let groups_before = groups.len();
        groups.retain(|_, group| {
            group
                .member_alert_ids
                .iter()
                .any(|id| active_alerts.contains_key(id))
        });
        let groups_removed = groups_before - groups.len();

        info!(
            alerts_removed = removed,
            groups_removed = groups_removed,
            "Cleaned up old alert data"
        );
        removed
    }

    /// Expire Active/Acknowledged alerts triggered longer than `max_age` ago
    pub fn expire_stale_alerts(&self, max_age: Duration) -> usize {
        let cutoff = cutoff_before(self.now(), to_chrono(max_age));
        let mut state = self.state();

        let mut expired = 0;
        for alert in state.active_alerts.values_mut() {
            if alert.triggered_at < cutoff && alert.expire() {
                debug!(alert_id = %alert.id, "Alert expired");
                expired += 1;
            }
        }

        if expired > 0 {
            self.inner.metrics.set_active_alerts(state.active_count() as i64);
        }
        expired
    }

    // -- reporting --

    pub fn get_alert_statistics(&self, hours: u32) -> AlertStatistics {
        let now = self.now();
        let state = self.state();
        AlertStatistics::from_history(
            state.history.iter(),
            hours,
            now,
            state.active_count(),
            state.groups.len(),
        )
    }

    pub fn get_statistics(&self) -> EngineStatistics {
        let counters = self.inner.counters.snapshot();
        let state = self.state();
        EngineStatistics {
            counters,
            registered_rules: state.rules.len(),
            active_alerts: state.active_count(),
            notification_channels: state.channels.len(),
            correlation_groups: state.groups.len(),
            anomaly_models: state.anomaly_models.len(),
            alert_history_size: state.history.len(),
        }
    }

    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        self.inner.counters.snapshot()
    }

    /// Health summary over the currently Active alerts
    pub fn system_health(&self) -> HealthSummary {
        let state = self.state();
        HealthSummary::from_active(
            state
                .active_alerts
                .values()
                .filter(|a| a.is_active())
                .map(|a| &a.severity),
        )
    }
}
