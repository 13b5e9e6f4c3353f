//! Alert Monitor - metric alerting daemon
//!
//! Loads rules and notification channels from configuration, runs
//! periodic maintenance and serves sample ingestion, health, metrics and
//! alert endpoints.

use alert_monitor::{api, config::MonitorConfig, notifier::LogNotifier};
use anyhow::Result;
use monitor_lib::{
    engine::AlertEngine,
    health::{components, HealthRegistry},
    maintenance::MaintenanceLoop,
    observability::{AlertMetrics, StructuredLogger},
    pipeline::MonitoringPipeline,
    series::MetricStore,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting alert-monitor");

    let config = MonitorConfig::load()?;
    info!(
        node_name = %config.node_name,
        rules = config.rules.len(),
        channels = config.channels.len(),
        "Monitor configured"
    );

    let health_registry = HealthRegistry::new();
    for name in components::ALL {
        health_registry.register(name).await;
    }

    // Register the global metrics before the first scrape
    let _metrics = AlertMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let store = Arc::new(MetricStore::default());
    let engine = AlertEngine::builder()
        .config(config.engine.clone())
        .notifier(Arc::new(LogNotifier))
        .node_name(&config.node_name)
        .build();

    for (channel_id, channel) in &config.channels {
        engine.register_notification_channel(channel_id.clone(), channel.clone());
    }
    for rule in &config.rules {
        engine.register_alert_rule(rule.clone());
    }
    logger.log_startup(MONITOR_VERSION, config.rules.len(), config.channels.len());

    let (shutdown_tx, _) = broadcast::channel(1);

    let maintenance = MaintenanceLoop::new(
        engine.clone(),
        store.clone(),
        health_registry.clone(),
        config.maintenance(),
        logger.clone(),
    );
    let maintenance_handle = tokio::spawn(maintenance.run(shutdown_tx.subscribe()));

    let pipeline = MonitoringPipeline::new(store.clone(), engine.clone());
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), pipeline));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    health_registry.set_ready(true).await;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(err)) => error!(error = %err, "API server failed"),
                Err(err) => error!(error = %err, "API server task panicked"),
            }
        }
    }

    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());
    if let Err(err) = maintenance_handle.await {
        error!(error = %err, "Maintenance task panicked");
    }

    info!("Shutting down");
    Ok(())
}
