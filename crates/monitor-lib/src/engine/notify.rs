//! Notification contract consumed by the engine

use crate::alert::Alert;
use crate::error::NotificationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Delivery mechanism behind a registered channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Sms,
    Slack,
    Webhook,
    PagerDuty,
    Teams,
    Discord,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Email => "email",
            ChannelType::Sms => "sms",
            ChannelType::Slack => "slack",
            ChannelType::Webhook => "webhook",
            ChannelType::PagerDuty => "pagerduty",
            ChannelType::Teams => "teams",
            ChannelType::Discord => "discord",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered notification channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub recipient: String,
}

impl ChannelConfig {
    pub fn new(channel_type: ChannelType, recipient: impl Into<String>) -> Self {
        Self {
            channel_type,
            recipient: recipient.into(),
        }
    }
}

/// A single outbound notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub channel_type: ChannelType,
    pub recipient: String,
    pub subject: String,
    pub message: String,
    pub data: Value,
}

impl Notification {
    /// Initial notification for a newly created alert
    pub fn for_alert(alert: &Alert, channel: &ChannelConfig) -> Self {
        Self {
            channel_type: channel.channel_type,
            recipient: channel.recipient.clone(),
            subject: format!(
                "[{}] {}",
                alert.severity.as_str().to_uppercase(),
                alert.rule_name
            ),
            message: alert.message.clone(),
            data: json!({
                "alert_id": alert.id,
                "rule_id": alert.rule_id,
                "rule_name": alert.rule_name,
                "metric_name": alert.metric_name,
                "severity": alert.severity,
                "trigger_value": alert.trigger_value,
                "condition": alert.trigger_condition,
                "message": alert.message,
                "triggered_at": alert.triggered_at,
                "dashboard_url": dashboard_url(alert),
            }),
        }
    }

    /// Follow-up sent when an alert is still active after `wait_minutes`
    pub fn escalation(alert: &Alert, channel: &ChannelConfig, wait_minutes: u64) -> Self {
        Self {
            channel_type: channel.channel_type,
            recipient: channel.recipient.clone(),
            subject: format!("[ESCALATION] {}", alert.rule_name),
            message: format!(
                "ESCALATION: {} (Unresolved for {} minutes)",
                alert.message, wait_minutes
            ),
            data: json!({
                "alert_id": alert.id,
                "escalation": true,
            }),
        }
    }
}

pub fn dashboard_url(alert: &Alert) -> String {
    format!("/dashboards/alert/{}", alert.id)
}

/// Outbound notification dispatch, implemented by the embedding service
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_notification(&self, notification: Notification) -> Result<(), NotificationError>;
}
