//! Alert records and their lifecycle
//!
//! Active → Acknowledged → Resolved, Active → Resolved and Active →
//! Suppressed are the user-driven transitions. Background maintenance may
//! expire any non-terminal alert.

use crate::models::{AlertStatus, Severity};
use crate::rules::{AlertRule, Evaluation};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Author recorded on system-generated annotations
const SYSTEM_AUTHOR: &str = "system";

/// Annotation categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Acknowledgment,
    Resolution,
    Suppression,
    Comment,
}

/// Append-only note attached to an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// An alert produced by a triggered rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub rule_id: String,
    pub rule_name: String,
    pub metric_name: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub trigger_value: f64,
    pub trigger_condition: String,
    pub message: String,
    /// Snapshot of the evaluation that produced the alert
    pub context: Evaluation,
    pub triggered_at: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Alert {
    /// Build an Active alert from a triggered evaluation
    pub fn from_evaluation(
        rule: &AlertRule,
        evaluation: &Evaluation,
        message: String,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            metric_name: rule.metric_name.clone(),
            severity: rule.severity,
            status: AlertStatus::Active,
            trigger_value: evaluation.metric_value,
            trigger_condition: evaluation.condition.clone(),
            message,
            context: evaluation.clone(),
            triggered_at,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
            assigned_to: None,
            tags: rule.tags.clone(),
            annotations: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// Acknowledge an Active alert. Returns false (and changes nothing) in
    /// any other state.
    pub fn acknowledge(&mut self, by: &str, note: Option<&str>, at: DateTime<Utc>) -> bool {
        if self.status != AlertStatus::Active {
            return false;
        }

        self.status = AlertStatus::Acknowledged;
        self.acknowledged_at = Some(at);
        self.acknowledged_by = Some(by.to_string());
        if let Some(note) = note.filter(|n| !n.is_empty()) {
            self.add_annotation(AnnotationKind::Acknowledgment, note, by, at);
        }
        true
    }

    /// Resolve an Active or Acknowledged alert
    pub fn resolve(&mut self, by: &str, note: Option<&str>, at: DateTime<Utc>) -> bool {
        if !matches!(self.status, AlertStatus::Active | AlertStatus::Acknowledged) {
            return false;
        }

        self.status = AlertStatus::Resolved;
        self.resolved_at = Some(at);
        self.resolved_by = Some(by.to_string());
        if let Some(note) = note.filter(|n| !n.is_empty()) {
            self.add_annotation(AnnotationKind::Resolution, note, by, at);
        }
        true
    }

    /// Suppress an Active alert; the reason is recorded as authored by "system"
    pub fn suppress(&mut self, reason: Option<&str>, at: DateTime<Utc>) -> bool {
        if self.status != AlertStatus::Active {
            return false;
        }

        self.status = AlertStatus::Suppressed;
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            self.add_annotation(AnnotationKind::Suppression, reason, SYSTEM_AUTHOR, at);
        }
        true
    }

    /// Force a non-terminal alert to Expired
    pub fn expire(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = AlertStatus::Expired;
        true
    }

    pub fn assign(&mut self, assignee: impl Into<String>) {
        self.assigned_to = Some(assignee.into());
    }

    pub fn add_annotation(
        &mut self,
        kind: AnnotationKind,
        content: &str,
        author: &str,
        at: DateTime<Utc>,
    ) {
        self.annotations.push(Annotation {
            id: Uuid::new_v4(),
            kind,
            content: content.to_string(),
            author: author.to_string(),
            created_at: at,
        });
    }

    /// Time from trigger to resolution, or to `now` while unresolved
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.resolved_at.unwrap_or(now) - self.triggered_at
    }

    /// Service the alert belongs to: the evaluation context's `service`,
    /// else the second segment of the metric name, else "unknown"
    pub fn service(&self) -> &str {
        if let Some(service) = self.context.service() {
            if service != "unknown" {
                return service;
            }
        }
        self.metric_name.split('.').nth(1).unwrap_or("unknown")
    }

    /// First dot-separated segment of the metric name
    pub fn metric_family(&self) -> &str {
        self.metric_name.split('.').next().unwrap_or(&self.metric_name)
    }
}
