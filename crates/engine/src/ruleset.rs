//! The mutable collection of rules a `ProgramAnalyzer` evaluates events against.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::rule::AnalyzeRule;

/// A named collection of rules, all belonging to the same application.
#[derive(Default)]
pub struct RuleSet {
    rules: HashMap<String, Arc<dyn AnalyzeRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `rule`, replacing any existing rule with the same name and
    /// cancelling its timer. Rejects rules defined for a different program.
    pub fn add_or_replace(
        &mut self,
        program_name: &str,
        rule: Arc<dyn AnalyzeRule>,
    ) -> EngineResult<()> {
        if rule.program_name() != program_name {
            return Err(EngineError::ProgramMismatch {
                rule: rule.rule_name().to_string(),
                expected: program_name.to_string(),
                actual: rule.program_name().to_string(),
            });
        }

        if let Some(previous) = self.rules.insert(rule.rule_name().to_string(), rule) {
            previous.cancel_timer();
        }
        Ok(())
    }

    /// Cancel every rule's pending timers and empty the set.
    pub fn unload_all(&mut self) {
        for (_, rule) in self.rules.drain() {
            rule.cancel_timer();
        }
    }

    /// Rules whose operation filter matches `operation_name`.
    pub fn matching(&self, operation_name: &str) -> Vec<Arc<dyn AnalyzeRule>> {
        self.rules
            .values()
            .filter(|rule| rule.matches_operation(operation_name))
            .cloned()
            .collect()
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::threshold_within_window::ThresholdWithinWindowRule;
    use auditwatch_core::AlarmLevel;
    use std::time::Duration;

    fn rule(name: &str, program: &str) -> Arc<dyn AnalyzeRule> {
        Arc::new(ThresholdWithinWindowRule::new(
            name,
            program,
            None,
            AlarmLevel::Low,
            "test",
            1,
            Duration::from_secs(1),
        ))
    }

    #[test]
    fn rejects_rule_for_a_different_program() {
        let mut set = RuleSet::new();
        let err = set.add_or_replace("billing", rule("r1", "payments")).unwrap_err();
        assert!(matches!(err, EngineError::ProgramMismatch { .. }));
        assert!(set.is_empty());
    }

    #[test]
    fn replacing_a_rule_cancels_the_previous_ones_timer() {
        let mut set = RuleSet::new();
        set.add_or_replace("billing", rule("r1", "billing")).unwrap();
        set.add_or_replace("billing", rule("r1", "billing")).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn unload_all_empties_the_set() {
        let mut set = RuleSet::new();
        set.add_or_replace("billing", rule("r1", "billing")).unwrap();
        set.add_or_replace("billing", rule("r2", "billing")).unwrap();
        set.unload_all();
        assert!(set.is_empty());
    }
}
