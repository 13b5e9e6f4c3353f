//! Metric statistics store and alert engine
//!
//! This crate provides the core functionality for:
//! - Retention-bounded metric series with statistics and anomaly detection
//! - Alert rules with threshold, anomaly, rate and missing-data conditions
//! - Alert creation with dedup, suppression, notification and escalation
//! - Correlation of related alerts
//! - Health checks and observability

pub mod alert;
pub mod buffer;
pub mod clock;
pub mod engine;
pub mod error;
pub mod health;
pub mod maintenance;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod rules;
pub mod series;

pub use alert::{Alert, Annotation, AnnotationKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{
    AlertEngine, AlertEngineBuilder, ChannelConfig, ChannelType, EngineConfig, Notification,
    NotificationService,
};
pub use error::{ConditionError, EngineError, NotificationError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use maintenance::{MaintenanceConfig, MaintenanceLoop, MaintenanceReport};
pub use models::*;
pub use observability::{AlertMetrics, StructuredLogger};
pub use pipeline::MonitoringPipeline;
pub use rules::{AlertRule, Condition, Evaluation};
pub use series::{MetricDefinition, MetricStatistics, MetricStore};
