//! Alert rules
//!
//! A rule binds one metric to a condition and carries its own throttling
//! state: cooldown, trigger counter and last evaluation time.

mod condition;
mod suppression;

pub use condition::{ComparisonOperator, Condition, ConditionKind, ConditionOutcome, RateOperator};
pub use suppression::{MatchOperator, SuppressionCondition, TimeWindow};

use crate::models::{cutoff_before, duration_secs, to_chrono, Context, Severity};
use crate::series::MetricStatistics;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);
const DEFAULT_MAX_TRIGGERS_PER_HOUR: u32 = 10;
const DEFAULT_ESCALATION_WAIT: Duration = Duration::from_secs(15 * 60);

/// One step of an escalation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationLevel {
    #[serde(
        default = "default_escalation_wait",
        with = "duration_secs",
        rename = "wait_secs"
    )]
    pub wait: Duration,
    #[serde(default)]
    pub channel_ids: Vec<String>,
}

impl EscalationLevel {
    pub fn new(wait: Duration, channel_ids: Vec<String>) -> Self {
        Self { wait, channel_ids }
    }

    pub fn wait_minutes(&self) -> u64 {
        self.wait.as_secs() / 60
    }
}

fn default_escalation_wait() -> Duration {
    DEFAULT_ESCALATION_WAIT
}

fn default_cooldown() -> Duration {
    DEFAULT_COOLDOWN
}

fn default_max_triggers() -> u32 {
    DEFAULT_MAX_TRIGGERS_PER_HOUR
}

fn default_enabled() -> bool {
    true
}

fn new_rule_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Alert rule definition plus runtime throttling state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    #[serde(default = "new_rule_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub metric_name: String,
    pub condition: Condition,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cooldown", with = "duration_secs", rename = "cooldown_secs")]
    pub cooldown: Duration,
    /// Zero disables rate limiting
    #[serde(default = "default_max_triggers")]
    pub max_triggers_per_hour: u32,
    #[serde(default)]
    pub notification_channel_ids: Vec<String>,
    #[serde(default)]
    pub escalation_policy: Vec<EscalationLevel>,
    #[serde(default)]
    pub suppression_conditions: Vec<SuppressionCondition>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trigger_count: u32,
    #[serde(default)]
    pub last_evaluation_at: Option<DateTime<Utc>>,
}

/// Outcome of evaluating one rule against one metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub triggered: bool,
    pub rule_id: String,
    pub rule_name: String,
    pub metric_name: String,
    pub metric_value: f64,
    pub condition: String,
    pub severity: Severity,
    pub evaluated_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_age_minutes: Option<f64>,
    /// Caller-supplied context the rule was evaluated with
    #[serde(default)]
    pub context: Context,
}

impl Evaluation {
    fn skipped(rule: &AlertRule, value: f64, now: DateTime<Utc>, context: &Context) -> Self {
        Self {
            triggered: false,
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            metric_name: rule.metric_name.clone(),
            metric_value: value,
            condition: rule.condition.describe(),
            severity: rule.severity,
            evaluated_at: now,
            reason: String::new(),
            trigger_count: None,
            z_score: None,
            rate: None,
            data_age_minutes: None,
            context: context.clone(),
        }
    }

    fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Caller context overlaid with the evaluation's own fields, used when
    /// matching suppression conditions after a trigger
    pub fn suppression_context(&self) -> Context {
        let mut merged = self.context.clone();
        merged.insert("rule_id".into(), json!(self.rule_id));
        merged.insert("rule_name".into(), json!(self.rule_name));
        merged.insert("metric_name".into(), json!(self.metric_name));
        merged.insert("metric_value".into(), json!(self.metric_value));
        merged.insert("condition".into(), json!(self.condition));
        merged.insert("severity".into(), json!(self.severity));
        merged.insert("reason".into(), json!(self.reason));

        let optional = [
            ("trigger_count", self.trigger_count.map(|c| json!(c))),
            ("z_score", self.z_score.map(|z| json!(z))),
            ("rate", self.rate.map(|r| json!(r))),
            ("data_age_minutes", self.data_age_minutes.map(|a| json!(a))),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                merged.insert(key.into(), value);
            }
        }
        merged
    }

    /// `service` from the caller context when it is a string
    pub fn service(&self) -> Option<&str> {
        self.context.get("service").and_then(Value::as_str)
    }
}

impl AlertRule {
    pub fn new(
        name: impl Into<String>,
        metric_name: impl Into<String>,
        condition: Condition,
    ) -> Self {
        Self {
            id: new_rule_id(),
            name: name.into(),
            description: String::new(),
            metric_name: metric_name.into(),
            condition,
            severity: Severity::default(),
            enabled: true,
            cooldown: DEFAULT_COOLDOWN,
            max_triggers_per_hour: DEFAULT_MAX_TRIGGERS_PER_HOUR,
            notification_channel_ids: Vec::new(),
            escalation_policy: Vec::new(),
            suppression_conditions: Vec::new(),
            tags: HashMap::new(),
            last_triggered_at: None,
            trigger_count: 0,
            last_evaluation_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_max_triggers_per_hour(mut self, max: u32) -> Self {
        self.max_triggers_per_hour = max;
        self
    }

    pub fn with_channels<I, S>(mut self, channel_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notification_channel_ids = channel_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_escalation(mut self, level: EscalationLevel) -> Self {
        self.escalation_policy.push(level);
        self
    }

    pub fn with_suppression(mut self, condition: SuppressionCondition) -> Self {
        self.suppression_conditions.push(condition);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Evaluate the rule for `value` at `now`.
    ///
    /// Throttling checks run before the condition, in order: enabled,
    /// cooldown, rate limit, suppression. A trigger records `now` as the last
    /// trigger time and bumps the trigger counter.
    pub fn evaluate(
        &mut self,
        value: f64,
        stats: &MetricStatistics,
        context: &Context,
        now: DateTime<Utc>,
    ) -> Evaluation {
        self.last_evaluation_at = Some(now);
        let evaluation = Evaluation::skipped(self, value, now, context);

        if !self.enabled {
            return evaluation.with_reason("Rule disabled");
        }
        if self.in_cooldown(now) {
            return evaluation.with_reason("In cooldown period");
        }
        if self.is_rate_limited(now) {
            return evaluation.with_reason("Rate limited");
        }
        if self.is_suppressed(context, now) {
            return evaluation.with_reason("Suppressed");
        }

        let outcome = match self.condition.evaluate(value, stats, now) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(rule_id = %self.id, reason = %err, "Condition not evaluable");
                return evaluation.with_reason(err.to_string());
            }
        };

        let mut evaluation = Evaluation {
            triggered: outcome.triggered,
            condition: outcome.condition,
            reason: outcome.reason,
            z_score: outcome.z_score,
            rate: outcome.rate,
            data_age_minutes: outcome.data_age_minutes,
            ..evaluation
        };

        if evaluation.triggered {
            self.last_triggered_at = Some(now);
            self.trigger_count += 1;
            evaluation.trigger_count = Some(self.trigger_count);
        }

        evaluation
    }

    fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered_at {
            Some(last) if !self.cooldown.is_zero() => last
                .checked_add_signed(to_chrono(self.cooldown))
                .map_or(true, |until| now < until),
            _ => false,
        }
    }

    /// Lifetime trigger count against the hourly cap, applied while the
    /// last trigger is under an hour old
    fn is_rate_limited(&self, now: DateTime<Utc>) -> bool {
        if self.max_triggers_per_hour == 0 {
            return false;
        }

        match self.last_triggered_at {
            Some(last) => {
                last > cutoff_before(now, ChronoDuration::hours(1))
                    && self.trigger_count >= self.max_triggers_per_hour
            }
            None => false,
        }
    }

    pub fn is_suppressed(&self, context: &Context, now: DateTime<Utc>) -> bool {
        self.suppression_conditions
            .iter()
            .any(|condition| condition.matches(context, now))
    }

    /// Render the alert message for a triggered evaluation
    pub fn render_message(&self, evaluation: &Evaluation) -> String {
        let template = self
            .condition
            .message_template
            .as_deref()
            .unwrap_or("{rule_name}: {metric_name} is {trigger_value}");

        template
            .replace("{rule_name}", &self.name)
            .replace("{metric_name}", &self.metric_name)
            .replace("{trigger_value}", &evaluation.metric_value.to_string())
            .replace("{condition}", &evaluation.condition)
            .replace("{reason}", &evaluation.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 14, 0, 0).unwrap()
    }

    fn cpu_rule() -> AlertRule {
        AlertRule::new(
            "High CPU",
            "system.cpu.usage",
            Condition::threshold(ComparisonOperator::Gt, 90.0),
        )
        .with_id("cpu-high")
        .with_severity(Severity::High)
    }

    #[test]
    fn test_threshold_rule_triggers() {
        let mut rule = cpu_rule();
        let evaluation = rule.evaluate(95.0, &MetricStatistics::default(), &Context::new(), now());

        assert!(evaluation.triggered);
        assert_eq!(evaluation.condition, "value gt 90");
        assert_eq!(evaluation.rule_id, "cpu-high");
        assert_eq!(evaluation.severity, Severity::High);
        assert_eq!(evaluation.trigger_count, Some(1));
        assert_eq!(rule.last_triggered_at, Some(now()));
        assert_eq!(rule.last_evaluation_at, Some(now()));
    }

    #[test]
    fn test_disabled_rule() {
        let mut rule = cpu_rule().disabled();
        let evaluation = rule.evaluate(95.0, &MetricStatistics::default(), &Context::new(), now());
        assert!(!evaluation.triggered);
        assert_eq!(evaluation.reason, "Rule disabled");
        assert_eq!(rule.last_evaluation_at, Some(now()));
    }

    #[test]
    fn test_cooldown_blocks_retrigger() {
        let mut rule = cpu_rule();
        let stats = MetricStatistics::default();
        let ctx = Context::new();

        assert!(rule.evaluate(95.0, &stats, &ctx, now()).triggered);

        let again = rule.evaluate(97.0, &stats, &ctx, now() + ChronoDuration::minutes(4));
        assert!(!again.triggered);
        assert_eq!(again.reason, "In cooldown period");

        let later = rule.evaluate(97.0, &stats, &ctx, now() + ChronoDuration::minutes(5));
        assert!(later.triggered);
        assert_eq!(later.trigger_count, Some(2));
    }

    #[test]
    fn test_cooldown_past_calendar_range_never_expires() {
        let mut rule = cpu_rule().with_cooldown(Duration::from_secs(u64::MAX));
        let stats = MetricStatistics::default();
        let ctx = Context::new();

        assert!(rule.evaluate(95.0, &stats, &ctx, now()).triggered);

        let again = rule.evaluate(97.0, &stats, &ctx, now() + ChronoDuration::days(365 * 100));
        assert!(!again.triggered);
        assert_eq!(again.reason, "In cooldown period");
    }

    #[test]
    fn test_rate_limit_uses_trigger_count() {
        let mut rule = cpu_rule()
            .with_cooldown(Duration::ZERO)
            .with_max_triggers_per_hour(3);
        let stats = MetricStatistics::default();
        let ctx = Context::new();

        for i in 0..3 {
            let at = now() + ChronoDuration::minutes(i);
            assert!(rule.evaluate(95.0, &stats, &ctx, at).triggered);
        }

        let limited = rule.evaluate(95.0, &stats, &ctx, now() + ChronoDuration::minutes(10));
        assert!(!limited.triggered);
        assert_eq!(limited.reason, "Rate limited");

        // Once the last trigger is over an hour old the cap no longer applies
        let resumed = rule.evaluate(95.0, &stats, &ctx, now() + ChronoDuration::minutes(63));
        assert!(resumed.triggered);
        assert_eq!(resumed.trigger_count, Some(4));
    }

    #[test]
    fn test_suppression_by_context_and_time() {
        let mut rule = cpu_rule().with_suppression(SuppressionCondition::context(
            "environment",
            MatchOperator::Eq,
            json!("staging"),
        ));
        let stats = MetricStatistics::default();

        let mut staging = Context::new();
        staging.insert("environment".into(), json!("staging"));
        let suppressed = rule.evaluate(95.0, &stats, &staging, now());
        assert!(!suppressed.triggered);
        assert_eq!(suppressed.reason, "Suppressed");
        assert_eq!(rule.trigger_count, 0);

        let mut windowed = cpu_rule().with_suppression(SuppressionCondition::time(
            NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        ));
        let during = windowed.evaluate(95.0, &stats, &Context::new(), now());
        assert_eq!(during.reason, "Suppressed");
    }

    #[test]
    fn test_condition_error_becomes_reason() {
        let mut rule = AlertRule::new("Latency drift", "app.latency", Condition::anomaly(2.5));
        let evaluation = rule.evaluate(10.0, &MetricStatistics::default(), &Context::new(), now());

        assert!(!evaluation.triggered);
        assert_eq!(
            evaluation.reason,
            "Insufficient statistics for anomaly detection"
        );
        assert_eq!(rule.trigger_count, 0);
    }

    #[test]
    fn test_render_message() {
        let mut rule = cpu_rule();
        let evaluation = rule.evaluate(95.0, &MetricStatistics::default(), &Context::new(), now());
        assert_eq!(rule.render_message(&evaluation), "High CPU: system.cpu.usage is 95");

        rule.condition = Condition::threshold(ComparisonOperator::Gt, 90.0)
            .with_message_template("{metric_name} breached {condition} ({reason})");
        assert_eq!(
            rule.render_message(&evaluation),
            "system.cpu.usage breached value gt 90 (Value 95 gt 90)"
        );
    }

    #[test]
    fn test_suppression_context_merges_fields() {
        let mut ctx = Context::new();
        ctx.insert("service".into(), json!("checkout"));

        let mut rule = cpu_rule();
        let evaluation = rule.evaluate(95.0, &MetricStatistics::default(), &ctx, now());
        let merged = evaluation.suppression_context();

        assert_eq!(merged["service"], "checkout");
        assert_eq!(merged["metric_value"], 95.0);
        assert_eq!(merged["severity"], "high");
        assert_eq!(merged["trigger_count"], 1);
        assert_eq!(evaluation.service(), Some("checkout"));
    }

    #[test]
    fn test_rule_deserializes_with_defaults() {
        let rule: AlertRule = serde_json::from_value(json!({
            "name": "Disk full",
            "metric_name": "system.disk.usage",
            "condition": {"type": "threshold", "operator": "gte", "threshold": 95},
            "severity": "critical",
            "escalation_policy": [{"wait_secs": 900, "channel_ids": ["oncall"]}]
        }))
        .unwrap();

        assert!(!rule.id.is_empty());
        assert!(rule.enabled);
        assert_eq!(rule.cooldown, Duration::from_secs(300));
        assert_eq!(rule.max_triggers_per_hour, 10);
        assert_eq!(rule.severity, Severity::Critical);
        assert_eq!(rule.escalation_policy[0].wait_minutes(), 15);
    }
}
