//! Alert rule condition kinds and their evaluation

use crate::error::ConditionError;
use crate::series::{AnomalyMethod, MetricStatistics, DEFAULT_LOOKBACK};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_Z_SCORE_THRESHOLD: f64 = 2.5;
const DEFAULT_SENSITIVITY: f64 = 0.8;
const DEFAULT_MAX_AGE_MINUTES: f64 = 10.0;

/// Comparison used by threshold conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOperator {
    #[default]
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::Eq => "eq",
            ComparisonOperator::Ne => "ne",
        }
    }

    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            ComparisonOperator::Gt => value > threshold,
            ComparisonOperator::Gte => value >= threshold,
            ComparisonOperator::Lt => value < threshold,
            ComparisonOperator::Lte => value <= threshold,
            ComparisonOperator::Eq => value == threshold,
            ComparisonOperator::Ne => value != threshold,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a rate-of-change condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateOperator {
    #[default]
    Gt,
    Lt,
}

impl RateOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateOperator::Gt => "gt",
            RateOperator::Lt => "lt",
        }
    }
}

impl fmt::Display for RateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed set of condition kinds a rule can carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionKind {
    Threshold {
        #[serde(default)]
        operator: ComparisonOperator,
        #[serde(default)]
        threshold: f64,
    },
    Anomaly {
        #[serde(default = "default_z_score_threshold")]
        z_score_threshold: f64,
        #[serde(default)]
        detection_method: AnomalyMethod,
        #[serde(default = "default_sensitivity")]
        sensitivity: f64,
        #[serde(default = "default_lookback_points")]
        lookback_points: usize,
    },
    Rate {
        #[serde(default)]
        operator: RateOperator,
        /// Percent change that trips the condition
        #[serde(default)]
        rate_threshold: f64,
        #[serde(default)]
        previous_value: f64,
    },
    MissingData {
        #[serde(default = "default_max_age_minutes")]
        max_age_minutes: f64,
    },
}

fn default_z_score_threshold() -> f64 {
    DEFAULT_Z_SCORE_THRESHOLD
}

fn default_sensitivity() -> f64 {
    DEFAULT_SENSITIVITY
}

fn default_lookback_points() -> usize {
    DEFAULT_LOOKBACK
}

fn default_max_age_minutes() -> f64 {
    DEFAULT_MAX_AGE_MINUTES
}

/// Rule condition plus the optional alert message template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(flatten)]
    pub kind: ConditionKind,
    /// Placeholders: `{rule_name}`, `{metric_name}`, `{trigger_value}`,
    /// `{condition}`, `{reason}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template: Option<String>,
}

/// Result of evaluating a condition against one value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionOutcome {
    pub triggered: bool,
    pub condition: String,
    pub reason: String,
    pub z_score: Option<f64>,
    pub rate: Option<f64>,
    pub data_age_minutes: Option<f64>,
}

impl Condition {
    pub fn threshold(operator: ComparisonOperator, threshold: f64) -> Self {
        ConditionKind::Threshold {
            operator,
            threshold,
        }
        .into()
    }

    pub fn anomaly(z_score_threshold: f64) -> Self {
        ConditionKind::Anomaly {
            z_score_threshold,
            detection_method: AnomalyMethod::default(),
            sensitivity: DEFAULT_SENSITIVITY,
            lookback_points: DEFAULT_LOOKBACK,
        }
        .into()
    }

    pub fn rate(operator: RateOperator, rate_threshold: f64, previous_value: f64) -> Self {
        ConditionKind::Rate {
            operator,
            rate_threshold,
            previous_value,
        }
        .into()
    }

    pub fn missing_data(max_age_minutes: f64) -> Self {
        ConditionKind::MissingData { max_age_minutes }.into()
    }

    pub fn with_message_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = Some(template.into());
        self
    }

    pub fn is_anomaly(&self) -> bool {
        matches!(self.kind, ConditionKind::Anomaly { .. })
    }

    /// Human-readable form of the condition, e.g. `value gt 90`
    pub fn describe(&self) -> String {
        match &self.kind {
            ConditionKind::Threshold {
                operator,
                threshold,
            } => format!("value {} {}", operator, threshold),
            ConditionKind::Anomaly {
                z_score_threshold, ..
            } => format!("z_score > {}", z_score_threshold),
            ConditionKind::Rate {
                operator,
                rate_threshold,
                ..
            } => format!("rate {} {}%", operator, rate_threshold),
            ConditionKind::MissingData { max_age_minutes } => {
                format!("data_age > {} minutes", max_age_minutes)
            }
        }
    }

    /// Evaluate the condition for `value`.
    ///
    /// Errors mean the condition could not be evaluated at all; callers
    /// report them as a not-triggered evaluation.
    pub fn evaluate(
        &self,
        value: f64,
        stats: &MetricStatistics,
        now: DateTime<Utc>,
    ) -> Result<ConditionOutcome, ConditionError> {
        let mut outcome = ConditionOutcome {
            condition: self.describe(),
            ..ConditionOutcome::default()
        };

        match &self.kind {
            ConditionKind::Threshold {
                operator,
                threshold,
            } => {
                outcome.triggered = operator.compare(value, *threshold);
                if outcome.triggered {
                    outcome.reason = format!("Value {} {} {}", value, operator, threshold);
                }
            }
            ConditionKind::Anomaly {
                z_score_threshold, ..
            } => {
                let (Some(mean), Some(std_dev)) = (stats.mean, stats.std_dev) else {
                    return Err(ConditionError::InsufficientStatistics);
                };
                if std_dev == 0.0 {
                    return Err(ConditionError::NoVariance);
                }

                let z_score = (value - mean).abs() / std_dev;
                outcome.z_score = Some(z_score);
                outcome.triggered = z_score > *z_score_threshold;
                if outcome.triggered {
                    outcome.reason = format!(
                        "Z-score {:.2} exceeds threshold {}",
                        z_score, z_score_threshold
                    );
                }
            }
            ConditionKind::Rate {
                operator,
                rate_threshold,
                previous_value,
            } => {
                if *previous_value == 0.0 {
                    return Err(ConditionError::NoPreviousValue);
                }

                let rate = (value - previous_value) / previous_value * 100.0;
                outcome.rate = Some(rate);
                outcome.triggered = match operator {
                    RateOperator::Gt => rate > *rate_threshold,
                    RateOperator::Lt => rate < *rate_threshold,
                };
                if outcome.triggered {
                    outcome.reason =
                        format!("Rate {:.2}% {} {}%", rate, operator, rate_threshold);
                }
            }
            ConditionKind::MissingData { max_age_minutes } => match stats.last_timestamp {
                None => {
                    outcome.triggered = true;
                    outcome.reason = "No data available".to_string();
                }
                Some(last) => {
                    let age_minutes = (now - last).num_milliseconds() as f64 / 60_000.0;
                    outcome.data_age_minutes = Some(age_minutes);
                    outcome.triggered = age_minutes > *max_age_minutes;
                    if outcome.triggered {
                        outcome.reason = format!("Data is {:.1} minutes old", age_minutes);
                    }
                }
            },
        }

        Ok(outcome)
    }
}

impl From<ConditionKind> for Condition {
    fn from(kind: ConditionKind) -> Self {
        Self {
            kind,
            message_template: None,
        }
    }
}
