//! Core data models shared by the metric store and the alert engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Caller-supplied evaluation context (service name, host, region, ...)
pub type Context = serde_json::Map<String, serde_json::Value>;

/// A single timestamped metric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MetricSample {
    /// Returns true if every filter entry is present in the sample tags
    pub fn matches_tags(&self, filter: &HashMap<String, String>) -> bool {
        filter
            .iter()
            .all(|(key, value)| self.tags.get(key) == Some(value))
    }
}

/// Alert severity levels
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    /// Low-priority severities are the first to go under alert storms
    pub fn is_low_priority(&self) -> bool {
        matches!(self, Severity::Low | Severity::Medium)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Suppressed,
    Expired,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Suppressed => "suppressed",
            AlertStatus::Expired => "expired",
        }
    }

    /// Returns true once the alert can no longer be acknowledged or resolved
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AlertStatus::Resolved | AlertStatus::Suppressed | AlertStatus::Expired
        )
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialize `std::time::Duration` as whole seconds
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Convert a std duration into a chrono duration, saturating on overflow
pub(crate) fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// `at - window`, clamped to the earliest representable instant
pub(crate) fn cutoff_before(at: DateTime<Utc>, window: chrono::Duration) -> DateTime<Utc> {
    at.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
