//! Fires when too much time passes between consecutive matching events,
//! whether the gap is observed on arrival or detected by an idle timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use auditwatch_core::{AlarmLevel, AlarmMessage, SystemEvent};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::rule::{AlarmObserver, AnalyzeRule};

struct Shared {
    rule_name: String,
    program_name: String,
    alarm_level: AlarmLevel,
    alarm_message: String,
    max_gap: Duration,
    state: Mutex<State>,
}

struct State {
    last_seen: Option<DateTime<Utc>>,
    /// Bumped on every event and every cancellation so a timer fired from a
    /// stale generation can tell it no longer owns the gap it was watching.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    observer: Option<AlarmObserver>,
}

pub struct TimeBetweenOperationsRule {
    operation_name: Option<String>,
    shared: Arc<Shared>,
}

impl TimeBetweenOperationsRule {
    pub fn new(
        rule_name: impl Into<String>,
        program_name: impl Into<String>,
        operation_name: Option<String>,
        alarm_level: AlarmLevel,
        alarm_message: impl Into<String>,
        max_gap: Duration,
    ) -> Self {
        Self {
            operation_name,
            shared: Arc::new(Shared {
                rule_name: rule_name.into(),
                program_name: program_name.into(),
                alarm_level,
                alarm_message: alarm_message.into(),
                max_gap,
                state: Mutex::new(State {
                    last_seen: None,
                    generation: 0,
                    timer: None,
                    observer: None,
                }),
            }),
        }
    }
}

impl Shared {
    fn rearm(self: &Arc<Self>) {
        let mut state = self.state.lock().expect("time-between rule mutex poisoned");
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        let generation = state.generation;

        let shared = Arc::clone(self);
        let max_gap = self.max_gap;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(max_gap).await;
            shared.fire_if_still_current(generation);
        }));
    }

    fn fire_if_still_current(&self, generation: u64) {
        let mut state = self.state.lock().expect("time-between rule mutex poisoned");
        if state.generation != generation {
            return;
        }
        state.last_seen = None;
        if let Some(observer) = &state.observer {
            let alarm = AlarmMessage::new(
                self.alarm_level,
                self.program_name.clone(),
                self.rule_name.clone(),
                self.alarm_message.clone(),
            );
            if observer.send(alarm).is_err() {
                debug!(rule = %self.rule_name, "alarm observer dropped, timeout alarm lost");
            }
        }
    }
}

#[async_trait]
impl AnalyzeRule for TimeBetweenOperationsRule {
    fn rule_name(&self) -> &str {
        &self.shared.rule_name
    }

    fn program_name(&self) -> &str {
        &self.shared.program_name
    }

    fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    fn alarm_level(&self) -> AlarmLevel {
        self.shared.alarm_level
    }

    fn alarm_message(&self) -> &str {
        &self.shared.alarm_message
    }

    async fn add_and_check_if_triggered(&self, event: &SystemEvent) -> bool {
        let max_gap = chrono::Duration::from_std(self.shared.max_gap).unwrap_or(chrono::Duration::zero());
        let triggered = {
            let mut state = self.shared.state.lock().expect("time-between rule mutex poisoned");
            let triggered = match state.last_seen {
                Some(last) => event.timestamp.signed_duration_since(last) > max_gap,
                None => false,
            };
            state.last_seen = Some(event.timestamp);
            triggered
        };
        self.shared.rearm();
        triggered
    }

    fn reset(&self) {
        let mut state = self.shared.state.lock().expect("time-between rule mutex poisoned");
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        state.last_seen = None;
    }

    fn attach_observer(&self, observer: AlarmObserver) {
        let mut state = self.shared.state.lock().expect("time-between rule mutex poisoned");
        state.observer = Some(observer);
    }

    fn cancel_timer(&self) {
        let mut state = self.shared.state.lock().expect("time-between rule mutex poisoned");
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditwatch_core::EventOutcome;
    use tokio::sync::mpsc;

    fn event_at(seconds: i64) -> SystemEvent {
        SystemEvent::new("payments", "settle-batch", EventOutcome::Success)
            .with_timestamp(Utc::now() + chrono::Duration::seconds(seconds))
    }

    #[tokio::test]
    async fn no_trigger_on_first_event() {
        let rule = TimeBetweenOperationsRule::new(
            "settle-gap",
            "payments",
            Some("settle-batch".to_string()),
            AlarmLevel::High,
            "no settlement seen recently",
            Duration::from_secs(300),
        );
        assert!(!rule.add_and_check_if_triggered(&event_at(0)).await);
    }

    #[tokio::test]
    async fn triggers_when_gap_between_events_exceeds_max() {
        let rule = TimeBetweenOperationsRule::new(
            "settle-gap",
            "payments",
            None,
            AlarmLevel::High,
            "no settlement seen recently",
            Duration::from_secs(60),
        );
        assert!(!rule.add_and_check_if_triggered(&event_at(0)).await);
        assert!(rule.add_and_check_if_triggered(&event_at(120)).await);
    }

    #[tokio::test]
    async fn fires_via_timer_when_no_event_arrives() {
        let rule = TimeBetweenOperationsRule::new(
            "settle-gap",
            "payments",
            None,
            AlarmLevel::Critical,
            "no settlement in time",
            Duration::from_millis(30),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        rule.attach_observer(tx);

        assert!(!rule.add_and_check_if_triggered(&event_at(0)).await);

        let alarm = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("timer should have fired")
            .expect("channel should still be open");
        assert_eq!(alarm.rule_name, "settle-gap");
        assert_eq!(alarm.level, AlarmLevel::Critical);
    }

    #[tokio::test]
    async fn cancel_timer_suppresses_pending_timeout_alarm() {
        let rule = TimeBetweenOperationsRule::new(
            "settle-gap",
            "payments",
            None,
            AlarmLevel::Critical,
            "no settlement in time",
            Duration::from_millis(30),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        rule.attach_observer(tx);

        assert!(!rule.add_and_check_if_triggered(&event_at(0)).await);
        rule.cancel_timer();

        let result = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_err(), "no alarm should have arrived after cancellation");
    }
}
