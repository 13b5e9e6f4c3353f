//! Notification service that writes deliveries to the log

use async_trait::async_trait;
use monitor_lib::engine::{Notification, NotificationService};
use monitor_lib::error::NotificationError;
use tracing::info;

/// Emits every notification as a structured log record
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationService for LogNotifier {
    async fn send_notification(&self, notification: Notification) -> Result<(), NotificationError> {
        let data = serde_json::to_string(&notification.data)?;
        info!(
            event = "notification",
            channel_type = %notification.channel_type,
            recipient = %notification.recipient,
            subject = %notification.subject,
            message = %notification.message,
            data = %data,
            "Notification delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_lib::engine::ChannelType;
    use serde_json::json;

    #[tokio::test]
    async fn test_log_notifier_accepts_notifications() {
        let notification = Notification {
            channel_type: ChannelType::Email,
            recipient: "oncall@example.com".to_string(),
            subject: "[LOW] Disk".to_string(),
            message: "Disk: host.disk is 81".to_string(),
            data: json!({ "alert_id": "a1" }),
        };

        assert!(LogNotifier.send_notification(notification).await.is_ok());
    }
}
