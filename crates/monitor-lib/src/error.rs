//! Error types for the monitoring core

use uuid::Uuid;

/// Errors returned by engine management operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("alert rule '{0}' is not registered")]
    RuleNotFound(String),

    #[error("alert {0} not found")]
    AlertNotFound(Uuid),

    #[error("notification channel '{0}' is not registered")]
    ChannelNotFound(String),
}

/// Reasons a rule condition cannot be evaluated.
///
/// These never escape rule evaluation; they become the `reason` of a
/// not-triggered evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("Insufficient statistics for anomaly detection")]
    InsufficientStatistics,

    #[error("No variance in data")]
    NoVariance,

    #[error("No previous value for rate calculation")]
    NoPreviousValue,
}

/// Failures reported by a [`NotificationService`](crate::engine::NotificationService)
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("channel {channel} unavailable: {reason}")]
    ChannelUnavailable { channel: String, reason: String },

    #[error("delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },

    #[error("notification payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
