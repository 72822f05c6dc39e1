//! The simplest possible sink: every alarm becomes one structured log line.

use async_trait::async_trait;
use auditwatch_core::{AlarmLevel, AlarmMessage};
use auditwatch_engine::sink::{AlarmSink, AlarmSinkError};
use tracing::{error, info, warn};

/// Logs every alarm at a level matched to its severity. Never fails: this
/// is the sink operators fall back to when nothing downstream is configured.
#[derive(Debug, Default)]
pub struct LoggingAlarmSink;

impl LoggingAlarmSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlarmSink for LoggingAlarmSink {
    async fn raise_alarm(&self, alarm: AlarmMessage) -> Result<(), AlarmSinkError> {
        match alarm.level {
            AlarmLevel::Low | AlarmLevel::Medium => info!(
                rule = %alarm.rule_name,
                application = %alarm.source_application,
                level = alarm.level.as_str(),
                "{}",
                alarm.summary
            ),
            AlarmLevel::High => warn!(
                rule = %alarm.rule_name,
                application = %alarm.source_application,
                level = alarm.level.as_str(),
                "{}",
                alarm.summary
            ),
            AlarmLevel::Critical => error!(
                rule = %alarm.rule_name,
                application = %alarm.source_application,
                level = alarm.level.as_str(),
                "{}",
                alarm.summary
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_fails_regardless_of_level() {
        let sink = LoggingAlarmSink::new();
        for level in [AlarmLevel::Low, AlarmLevel::Medium, AlarmLevel::High, AlarmLevel::Critical] {
            let alarm = AlarmMessage::new(level, "billing", "r1", "summary");
            assert!(sink.raise_alarm(alarm).await.is_ok());
        }
    }
}
