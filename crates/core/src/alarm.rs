//! Alarm and engine-diagnostic message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::event::EventId;

/// Severity of a raised alarm, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl AlarmLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmLevel::Low => "low",
            AlarmLevel::Medium => "medium",
            AlarmLevel::High => "high",
            AlarmLevel::Critical => "critical",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            AlarmLevel::Low => 0,
            AlarmLevel::Medium => 1,
            AlarmLevel::High => 2,
            AlarmLevel::Critical => 3,
        }
    }
}

impl PartialOrd for AlarmLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AlarmLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// A levelled notification raised when a rule triggers, published to an
/// external [`AlarmSink`](https://docs.rs/auditwatch-alarms) implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmMessage {
    pub level: AlarmLevel,

    /// Application the alarm concerns.
    pub source_application: String,

    /// Name of the rule that raised the alarm.
    pub rule_name: String,

    /// Short human summary, usually the rule's rendered alarm message.
    pub summary: String,

    /// Longer detail, often the underlying captured error message.
    pub detail: Option<String>,

    /// Id of the event that triggered the alarm, absent for timer-driven triggers.
    pub event_id: Option<EventId>,

    pub timestamp: DateTime<Utc>,
}

impl AlarmMessage {
    pub fn new(
        level: AlarmLevel,
        source_application: impl Into<String>,
        rule_name: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            level,
            source_application: source_application.into(),
            rule_name: rule_name.into(),
            summary: summary.into(),
            detail: None,
            event_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }
}

/// A UTC-stamped diagnostic string appended to an in-memory queue for
/// operator introspection. Not an alarm: nothing downstream of the engine is
/// expected to page on one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMessage {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl EngineMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_levels_order_by_severity() {
        assert!(AlarmLevel::Low < AlarmLevel::Medium);
        assert!(AlarmLevel::Medium < AlarmLevel::High);
        assert!(AlarmLevel::High < AlarmLevel::Critical);
    }
}
