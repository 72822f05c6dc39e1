//! Fires when at least N matching events land inside a sliding time window.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use auditwatch_core::{AlarmLevel, SystemEvent};
use chrono::{DateTime, Utc};

use crate::rule::AnalyzeRule;

/// An optional extra filter beyond the operation-name match, e.g.
/// "only count failures".
pub type EventPredicate = dyn Fn(&SystemEvent) -> bool + Send + Sync;

pub struct ThresholdWithinWindowRule {
    rule_name: String,
    program_name: String,
    operation_name: Option<String>,
    alarm_level: AlarmLevel,
    alarm_message: String,
    threshold: usize,
    window: chrono::Duration,
    predicate: Option<Box<EventPredicate>>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    timestamps: VecDeque<DateTime<Utc>>,
    /// True once the threshold has fired, until the window count drops back
    /// below `threshold`. Keeps one window from raising the same alarm on
    /// every subsequent matching event.
    cooldown: bool,
}

impl ThresholdWithinWindowRule {
    pub fn new(
        rule_name: impl Into<String>,
        program_name: impl Into<String>,
        operation_name: Option<String>,
        alarm_level: AlarmLevel,
        alarm_message: impl Into<String>,
        threshold: usize,
        window: Duration,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            program_name: program_name.into(),
            operation_name,
            alarm_level,
            alarm_message: alarm_message.into(),
            threshold: threshold.max(1),
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero()),
            predicate: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Restrict counted events to those matching `predicate`, e.g. failures only.
    pub fn with_predicate(mut self, predicate: Box<EventPredicate>) -> Self {
        self.predicate = Some(predicate);
        self
    }
}

#[async_trait]
impl AnalyzeRule for ThresholdWithinWindowRule {
    fn rule_name(&self) -> &str {
        &self.rule_name
    }

    fn program_name(&self) -> &str {
        &self.program_name
    }

    fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    fn alarm_level(&self) -> AlarmLevel {
        self.alarm_level
    }

    fn alarm_message(&self) -> &str {
        &self.alarm_message
    }

    async fn add_and_check_if_triggered(&self, event: &SystemEvent) -> bool {
        if let Some(predicate) = &self.predicate {
            if !predicate(event) {
                return false;
            }
        }

        let mut state = self.state.lock().expect("threshold rule mutex poisoned");

        state.timestamps.push_back(event.timestamp);
        let cutoff = event.timestamp - self.window;
        while matches!(state.timestamps.front(), Some(ts) if *ts < cutoff) {
            state.timestamps.pop_front();
        }

        if state.timestamps.len() < self.threshold {
            state.cooldown = false;
            return false;
        }

        if state.cooldown {
            return false;
        }

        state.cooldown = true;
        true
    }

    fn reset(&self) {
        let mut state = self.state.lock().expect("threshold rule mutex poisoned");
        state.timestamps.clear();
        state.cooldown = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditwatch_core::EventOutcome;

    fn event_at(seconds: i64) -> SystemEvent {
        SystemEvent::new("billing", "charge-card", EventOutcome::Failure)
            .with_timestamp(Utc::now() + chrono::Duration::seconds(seconds))
    }

    #[tokio::test]
    async fn fires_once_threshold_reached_then_cools_down() {
        let rule = ThresholdWithinWindowRule::new(
            "three-failures",
            "billing",
            Some("charge-card".to_string()),
            AlarmLevel::High,
            "three failures in a minute",
            3,
            Duration::from_secs(60),
        );

        assert!(!rule.add_and_check_if_triggered(&event_at(0)).await);
        assert!(!rule.add_and_check_if_triggered(&event_at(1)).await);
        assert!(rule.add_and_check_if_triggered(&event_at(2)).await);
        // Still at/over threshold: cooldown suppresses a repeat alarm.
        assert!(!rule.add_and_check_if_triggered(&event_at(3)).await);
    }

    #[tokio::test]
    async fn old_events_fall_out_of_the_window() {
        let rule = ThresholdWithinWindowRule::new(
            "two-in-ten",
            "billing",
            None,
            AlarmLevel::Medium,
            "two events in ten seconds",
            2,
            Duration::from_secs(10),
        );

        assert!(!rule.add_and_check_if_triggered(&event_at(0)).await);
        assert!(!rule.add_and_check_if_triggered(&event_at(20)).await);
        assert!(!rule.add_and_check_if_triggered(&event_at(21)).await);
    }

    #[tokio::test]
    async fn cooldown_clears_once_count_drops_below_threshold() {
        let rule = ThresholdWithinWindowRule::new(
            "two-in-five",
            "billing",
            None,
            AlarmLevel::Medium,
            "two events in five seconds",
            2,
            Duration::from_secs(5),
        );

        assert!(!rule.add_and_check_if_triggered(&event_at(0)).await);
        assert!(rule.add_and_check_if_triggered(&event_at(1)).await);
        // Both prior events age out of the window, dropping the count to
        // zero and clearing cooldown; two fresh events re-arm the rule.
        assert!(!rule.add_and_check_if_triggered(&event_at(10)).await);
        assert!(rule.add_and_check_if_triggered(&event_at(11)).await);
    }
}
