//! The `AlarmSink` contract: where a triggered rule's alarm goes.

use async_trait::async_trait;
use auditwatch_core::AlarmMessage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlarmSinkError {
    #[error("alarm delivery failed: {0}")]
    DeliveryFailed(String),
}

/// An external collaborator that receives triggered alarms.
///
/// Implementations live in `auditwatch-alarms`; the engine only depends on
/// this trait so that delivery (log line, websocket fan-out, webhook POST)
/// never blocks rule evaluation on a slow downstream.
#[async_trait]
pub trait AlarmSink: Send + Sync {
    async fn raise_alarm(&self, alarm: AlarmMessage) -> Result<(), AlarmSinkError>;
}
