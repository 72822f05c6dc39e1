//! Composes multiple sinks into one, so an analyzer can be wired to exactly
//! one `AlarmSink` while still reaching several destinations.

use async_trait::async_trait;
use auditwatch_core::AlarmMessage;
use auditwatch_engine::sink::{AlarmSink, AlarmSinkError};
use tracing::warn;

/// Delivers to every member sink, continuing past individual failures so
/// one unreachable webhook never silences the others.
pub struct FanOutAlarmSink {
    sinks: Vec<Box<dyn AlarmSink>>,
}

impl FanOutAlarmSink {
    pub fn new(sinks: Vec<Box<dyn AlarmSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AlarmSink for FanOutAlarmSink {
    async fn raise_alarm(&self, alarm: AlarmMessage) -> Result<(), AlarmSinkError> {
        let mut last_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.raise_alarm(alarm.clone()).await {
                warn!(error = %e, "one alarm sink in the fan-out failed");
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) if self.sinks.len() == 1 => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditwatch_core::AlarmLevel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        count: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl AlarmSink for CountingSink {
        async fn raise_alarm(&self, _alarm: AlarmMessage) -> Result<(), AlarmSinkError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AlarmSinkError::DeliveryFailed("simulated failure".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn delivers_to_every_sink_even_if_one_fails() {
        let count = Arc::new(AtomicUsize::new(0));
        let fan_out = FanOutAlarmSink::new(vec![
            Box::new(CountingSink { count: count.clone(), fail: true }),
            Box::new(CountingSink { count: count.clone(), fail: false }),
        ]);

        let result = fan_out
            .raise_alarm(AlarmMessage::new(AlarmLevel::High, "billing", "r1", "summary"))
            .await;

        assert!(result.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
