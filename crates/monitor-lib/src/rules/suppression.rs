//! Suppression conditions attached to alert rules

use crate::models::Context;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a context field is matched against the configured value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOperator {
    #[default]
    Eq,
    Ne,
    Contains,
    /// Numeric comparison; non-numeric fields never match
    Lt,
    Gt,
}

/// Daily time-of-day window in UTC, inclusive at both ends.
///
/// A window whose start is after its end spans midnight (23:00 - 03:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(rename = "start_time", with = "hhmm")]
    pub start: NaiveTime,
    #[serde(rename = "end_time", with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        let current_time = now.time();
        if self.start <= self.end {
            current_time >= self.start && current_time <= self.end
        } else {
            current_time >= self.start || current_time <= self.end
        }
    }
}

/// A condition that prevents an otherwise-triggered alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuppressionCondition {
    Context {
        field: String,
        #[serde(default)]
        operator: MatchOperator,
        #[serde(default)]
        value: Value,
    },
    Time(TimeWindow),
}

impl SuppressionCondition {
    pub fn context(field: impl Into<String>, operator: MatchOperator, value: Value) -> Self {
        SuppressionCondition::Context {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn time(start: NaiveTime, end: NaiveTime) -> Self {
        SuppressionCondition::Time(TimeWindow::new(start, end))
    }

    pub fn matches(&self, context: &Context, now: DateTime<Utc>) -> bool {
        match self {
            SuppressionCondition::Context {
                field,
                operator,
                value,
            } => match_field(context.get(field), *operator, value),
            SuppressionCondition::Time(window) => window.is_active(now),
        }
    }
}

fn match_field(actual: Option<&Value>, operator: MatchOperator, expected: &Value) -> bool {
    match operator {
        MatchOperator::Eq => actual.unwrap_or(&Value::Null) == expected,
        MatchOperator::Ne => actual.unwrap_or(&Value::Null) != expected,
        MatchOperator::Contains => match actual {
            None | Some(Value::Null) => false,
            Some(Value::Array(items)) => items.contains(expected),
            Some(Value::String(text)) => text.contains(&value_text(expected)),
            Some(other) => other.to_string().contains(&value_text(expected)),
        },
        MatchOperator::Lt | MatchOperator::Gt => {
            let (Some(actual), Some(expected)) =
                (actual.and_then(Value::as_f64), expected.as_f64())
            else {
                return false;
            };
            if operator == MatchOperator::Lt {
                actual < expected
            } else {
                actual > expected
            }
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// `HH:MM` (or `HH:MM:SS`) time-of-day serialization
mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| D::Error::custom(format!("invalid time '{}': {}", raw, e)))
    }
}
