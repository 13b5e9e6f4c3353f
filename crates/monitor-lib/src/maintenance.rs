//! Periodic housekeeping
//!
//! Each tick expires stale alerts, drops old closed alerts, refreshes the
//! store gauges and updates component and alert health.

use crate::engine::{AlertEngine, SystemHealth};
use crate::health::{components, HealthRegistry};
use crate::observability::{AlertMetrics, StructuredLogger};
use crate::series::MetricStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceConfig {
    pub interval: Duration,
    /// Closed alerts triggered longer ago than this are removed
    pub retention_days: u32,
    /// Open alerts triggered longer ago than this are expired
    pub stale_alert_age: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            retention_days: 7,
            stale_alert_age: Duration::from_secs(24 * 3600),
        }
    }
}

/// Outcome of one maintenance pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub expired_alerts: usize,
    pub removed_alerts: usize,
    pub active_alerts: usize,
    pub health: SystemHealth,
    /// Notification failures since the previous pass
    pub new_notification_failures: u64,
}

pub struct MaintenanceLoop {
    engine: AlertEngine,
    store: Arc<MetricStore>,
    health: HealthRegistry,
    config: MaintenanceConfig,
    metrics: AlertMetrics,
    logger: StructuredLogger,
    last_failures: u64,
}

impl MaintenanceLoop {
    pub fn new(
        engine: AlertEngine,
        store: Arc<MetricStore>,
        health: HealthRegistry,
        config: MaintenanceConfig,
        logger: StructuredLogger,
    ) -> Self {
        let last_failures = engine.get_performance_metrics().notifications_failed;
        Self {
            engine,
            store,
            health,
            config,
            metrics: AlertMetrics::new(),
            logger,
            last_failures,
        }
    }

    /// Run until a shutdown signal arrives
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            retention_days = self.config.retention_days,
            "Starting maintenance loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down maintenance loop");
                    break;
                }
            }
        }
    }

    /// Perform one maintenance pass
    pub async fn tick(&mut self) -> MaintenanceReport {
        let expired_alerts = self.engine.expire_stale_alerts(self.config.stale_alert_age);
        let removed_alerts = self.engine.cleanup_old_data(self.config.retention_days);

        let store = self.store.stats();
        self.metrics
            .set_store_size(store.series as i64, store.samples as i64);
        self.health.set_healthy(components::METRIC_STORE).await;

        let statistics = self.engine.get_statistics();
        self.metrics.set_active_alerts(statistics.active_alerts as i64);
        self.health.set_healthy(components::ALERT_ENGINE).await;

        let failures = statistics.counters.notifications_failed;
        let new_notification_failures = failures.saturating_sub(self.last_failures);
        self.last_failures = failures;
        if new_notification_failures > 0 {
            self.health
                .set_degraded(
                    components::NOTIFIER,
                    format!(
                        "{} notification deliveries failed since last check",
                        new_notification_failures
                    ),
                )
                .await;
        } else {
            self.health.set_healthy(components::NOTIFIER).await;
        }

        let summary = self.engine.system_health();
        let health = summary.status;
        self.health.set_alert_summary(summary).await;
        self.health.set_healthy(components::MAINTENANCE).await;

        self.logger
            .log_maintenance(expired_alerts, removed_alerts, statistics.active_alerts);

        MaintenanceReport {
            expired_alerts,
            removed_alerts,
            active_alerts: statistics.active_alerts,
            health,
            new_notification_failures,
        }
    }
}
