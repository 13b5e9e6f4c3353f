//! Deferred escalation of unresolved alerts

use super::{AlertEngine, EngineCounters, Notification};
use crate::rules::EscalationLevel;
use tracing::debug;
use uuid::Uuid;

impl AlertEngine {
    /// Fire `level` after its wait unless the alert has left the Active state
    pub(super) fn schedule_escalation(&self, alert_id: Uuid, level_index: usize, level: EscalationLevel) {
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(level.wait).await;
            engine.escalate(alert_id, level_index, &level).await;
        });
    }

    /// Returns true when the escalation was sent
    pub(super) async fn escalate(&self, alert_id: Uuid, level_index: usize, level: &EscalationLevel) -> bool {
        let (alert, targets) = {
            let state = self.state();
            match state.active_alerts.get(&alert_id) {
                Some(alert) if alert.is_active() => {
                    (alert.clone(), state.resolve_channels(&level.channel_ids))
                }
                _ => {
                    debug!(
                        alert_id = %alert_id,
                        escalation_level = level_index,
                        "Alert no longer active, skipping escalation"
                    );
                    return false;
                }
            }
        };

        let Some(notifier) = self.inner.notifier.clone() else {
            debug!(alert_id = %alert_id, "No notification service, skipping escalation");
            return false;
        };

        let wait_minutes = level.wait_minutes();
        self.inner
            .logger
            .log_alert_escalated(&alert, level_index, wait_minutes);
        EngineCounters::incr(&self.inner.counters.escalations_sent);
        self.inner.metrics.inc_escalations_sent();

        for (channel_id, channel) in targets {
            let notification = Notification::escalation(&alert, &channel, wait_minutes);
            self.deliver(notifier.as_ref(), &channel_id, notification)
                .await;
        }

        true
    }
}
