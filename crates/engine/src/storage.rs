//! The `RuleStorage` contract and the declarative `RuleDefinition` it serves,
//! plus the factory that turns a definition into a live `AnalyzeRule`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auditwatch_core::AlarmLevel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rule::AnalyzeRule;
use crate::rules::threshold_within_window::ThresholdWithinWindowRule;
use crate::rules::time_between_operations::TimeBetweenOperationsRule;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to read rule definitions: {0}")]
    ReadFailed(String),

    #[error("failed to write rule definitions: {0}")]
    WriteFailed(String),

    #[error("malformed rule definition: {0}")]
    Malformed(String),
}

/// An external source of truth for what rules should be installed.
///
/// Implementations live in `auditwatch-storage`; the engine depends only on
/// this trait so a reload never couples rule evaluation to a file format or
/// a database driver.
#[async_trait]
pub trait RuleStorage: Send + Sync {
    async fn load_all(&self) -> Result<Vec<RuleDefinition>, StorageError>;
}

/// A declarative description of one rule, serializable for storage outside
/// the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RuleDefinition {
    ThresholdWithinWindow {
        rule_name: String,
        program_name: String,
        operation_name: Option<String>,
        alarm_level: AlarmLevel,
        alarm_message: String,
        threshold: usize,
        window_seconds: u64,
        /// When set, only events with this outcome count toward the threshold.
        failures_only: bool,
    },
    TimeBetweenOperations {
        rule_name: String,
        program_name: String,
        operation_name: Option<String>,
        alarm_level: AlarmLevel,
        alarm_message: String,
        max_gap_seconds: u64,
    },
}

impl RuleDefinition {
    pub fn rule_name(&self) -> &str {
        match self {
            RuleDefinition::ThresholdWithinWindow { rule_name, .. } => rule_name,
            RuleDefinition::TimeBetweenOperations { rule_name, .. } => rule_name,
        }
    }

    pub fn program_name(&self) -> &str {
        match self {
            RuleDefinition::ThresholdWithinWindow { program_name, .. } => program_name,
            RuleDefinition::TimeBetweenOperations { program_name, .. } => program_name,
        }
    }
}

/// Build a live rule from its declarative definition.
pub fn build_rule(definition: &RuleDefinition) -> Arc<dyn AnalyzeRule> {
    match definition.clone() {
        RuleDefinition::ThresholdWithinWindow {
            rule_name,
            program_name,
            operation_name,
            alarm_level,
            alarm_message,
            threshold,
            window_seconds,
            failures_only,
        } => {
            let mut rule = ThresholdWithinWindowRule::new(
                rule_name,
                program_name,
                operation_name,
                alarm_level,
                alarm_message,
                threshold,
                Duration::from_secs(window_seconds),
            );
            if failures_only {
                rule = rule.with_predicate(Box::new(|event| event.is_failure()));
            }
            Arc::new(rule)
        }
        RuleDefinition::TimeBetweenOperations {
            rule_name,
            program_name,
            operation_name,
            alarm_level,
            alarm_message,
            max_gap_seconds,
        } => Arc::new(TimeBetweenOperationsRule::new(
            rule_name,
            program_name,
            operation_name,
            alarm_level,
            alarm_message,
            Duration::from_secs(max_gap_seconds),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_threshold_rule_from_definition() {
        let def = RuleDefinition::ThresholdWithinWindow {
            rule_name: "r1".into(),
            program_name: "billing".into(),
            operation_name: None,
            alarm_level: AlarmLevel::High,
            alarm_message: "too many failures".into(),
            threshold: 3,
            window_seconds: 60,
            failures_only: true,
        };
        let rule = build_rule(&def);
        assert_eq!(rule.rule_name(), "r1");
        assert_eq!(rule.program_name(), "billing");
    }

    #[test]
    fn builds_time_between_rule_from_definition() {
        let def = RuleDefinition::TimeBetweenOperations {
            rule_name: "r2".into(),
            program_name: "payments".into(),
            operation_name: Some("settle-batch".into()),
            alarm_level: AlarmLevel::Critical,
            alarm_message: "no settlement seen".into(),
            max_gap_seconds: 300,
        };
        let rule = build_rule(&def);
        assert_eq!(rule.rule_name(), "r2");
        assert_eq!(rule.operation_name(), Some("settle-batch"));
    }
}
