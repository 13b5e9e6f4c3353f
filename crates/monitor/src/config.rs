//! Daemon configuration

use anyhow::{Context, Result};
use monitor_lib::engine::{ChannelConfig, EngineConfig};
use monitor_lib::maintenance::MaintenanceConfig;
use monitor_lib::rules::AlertRule;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "MONITOR_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_secs: u64,

    /// Closed alerts are dropped this many days after triggering
    #[serde(default = "default_alert_retention_days")]
    pub alert_retention_days: u32,

    /// Open alerts are expired this many hours after triggering
    #[serde(default = "default_stale_alert_age_hours")]
    pub stale_alert_age_hours: u64,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Notification channels keyed by id
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,

    #[serde(default)]
    pub rules: Vec<AlertRule>,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "alert-monitor".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_maintenance_interval() -> u64 {
    60
}

fn default_alert_retention_days() -> u32 {
    7
}

fn default_stale_alert_age_hours() -> u64 {
    24
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            maintenance_interval_secs: default_maintenance_interval(),
            alert_retention_days: default_alert_retention_days(),
            stale_alert_age_hours: default_stale_alert_age_hours(),
            engine: EngineConfig::default(),
            channels: HashMap::new(),
            rules: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the optional file named by `MONITOR_CONFIG`,
    /// overlaid with `MONITOR__*` environment variables
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let config = builder
            .add_source(config::Environment::with_prefix("MONITOR").separator("__"))
            .build()
            .context("failed to read monitor configuration")?;

        config
            .try_deserialize()
            .context("invalid monitor configuration")
    }

    pub fn maintenance(&self) -> MaintenanceConfig {
        MaintenanceConfig {
            interval: Duration::from_secs(self.maintenance_interval_secs.max(1)),
            retention_days: self.alert_retention_days,
            stale_alert_age: Duration::from_secs(self.stale_alert_age_hours.saturating_mul(3600)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_lib::engine::ChannelType;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.engine.global_suppression_limit, 50);

        let maintenance = config.maintenance();
        assert_eq!(maintenance.retention_days, 7);
        assert_eq!(maintenance.stale_alert_age, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_huge_stale_alert_age_saturates() {
        let config = MonitorConfig {
            stale_alert_age_hours: u64::MAX,
            ..MonitorConfig::default()
        };
        assert_eq!(config.maintenance().stale_alert_age, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_deserialize_rules_and_channels() {
        let raw = r##"{
            "api_port": 9100,
            "engine": { "dedup_window_secs": 120 },
            "channels": {
                "ops": { "type": "slack", "recipient": "#ops" }
            },
            "rules": [{
                "id": "cpu-high",
                "name": "High CPU",
                "metric_name": "system.cpu.usage",
                "severity": "high",
                "condition": { "type": "threshold", "operator": "gt", "threshold": 90.0 },
                "notification_channel_ids": ["ops"],
                "escalation_policy": [{ "wait_secs": 600, "channel_ids": ["ops"] }]
            }]
        }"##;

        let config: MonitorConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.api_port, 9100);
        assert_eq!(config.engine.dedup_window, Duration::from_secs(120));
        assert_eq!(config.engine.volume_window, Duration::from_secs(600));
        assert_eq!(config.channels["ops"].channel_type, ChannelType::Slack);

        let rule = &config.rules[0];
        assert_eq!(rule.id, "cpu-high");
        assert_eq!(rule.escalation_policy[0].wait_minutes(), 10);
        assert!(rule.enabled);
    }
}
