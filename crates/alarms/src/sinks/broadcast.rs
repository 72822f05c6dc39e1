//! Fans alarms out to any number of in-process subscribers, e.g. a CLI's
//! live `tail` view or a future HTTP push endpoint.

use async_trait::async_trait;
use auditwatch_core::AlarmMessage;
use auditwatch_engine::sink::{AlarmSink, AlarmSinkError};
use tokio::sync::broadcast;
use tracing::debug;

/// Wraps a `tokio::sync::broadcast` channel. Publishing never fails even
/// with zero subscribers — a lagging or absent listener is the listener's
/// problem, not the rule engine's.
pub struct BroadcastAlarmSink {
    tx: broadcast::Sender<AlarmMessage>,
}

impl BroadcastAlarmSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlarmMessage> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl AlarmSink for BroadcastAlarmSink {
    async fn raise_alarm(&self, alarm: AlarmMessage) -> Result<(), AlarmSinkError> {
        if self.tx.send(alarm).is_err() {
            debug!("no subscribers attached to broadcast alarm sink");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditwatch_core::AlarmLevel;

    #[tokio::test]
    async fn subscribers_receive_published_alarms() {
        let sink = BroadcastAlarmSink::new(16);
        let mut rx = sink.subscribe();

        sink.raise_alarm(AlarmMessage::new(AlarmLevel::High, "billing", "r1", "summary"))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.rule_name, "r1");
    }

    #[tokio::test]
    async fn publishing_with_no_subscribers_does_not_error() {
        let sink = BroadcastAlarmSink::new(16);
        let result = sink
            .raise_alarm(AlarmMessage::new(AlarmLevel::Low, "billing", "r1", "summary"))
            .await;
        assert!(result.is_ok());
    }
}
