//! An in-memory `RuleStorage`, useful for tests and for a CLI invocation
//! that wants to seed rules without touching disk.

use std::sync::RwLock;

use async_trait::async_trait;
use auditwatch_engine::storage::{RuleDefinition, RuleStorage, StorageError};

#[derive(Default)]
pub struct InMemoryRuleStorage {
    definitions: RwLock<Vec<RuleDefinition>>,
}

impl InMemoryRuleStorage {
    pub fn new(definitions: Vec<RuleDefinition>) -> Self {
        Self {
            definitions: RwLock::new(definitions),
        }
    }

    pub fn replace_all(&self, definitions: Vec<RuleDefinition>) {
        *self.definitions.write().expect("rule storage mutex poisoned") = definitions;
    }
}

#[async_trait]
impl RuleStorage for InMemoryRuleStorage {
    async fn load_all(&self) -> Result<Vec<RuleDefinition>, StorageError> {
        Ok(self
            .definitions
            .read()
            .expect("rule storage mutex poisoned")
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditwatch_core::AlarmLevel;

    #[tokio::test]
    async fn returns_what_was_constructed_with() {
        let storage = InMemoryRuleStorage::new(vec![RuleDefinition::TimeBetweenOperations {
            rule_name: "r1".into(),
            program_name: "payments".into(),
            operation_name: None,
            alarm_level: AlarmLevel::Critical,
            alarm_message: "gap".into(),
            max_gap_seconds: 300,
        }]);
        let loaded = storage.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn replace_all_swaps_the_definitions() {
        let storage = InMemoryRuleStorage::new(vec![]);
        storage.replace_all(vec![RuleDefinition::TimeBetweenOperations {
            rule_name: "r2".into(),
            program_name: "payments".into(),
            operation_name: None,
            alarm_level: AlarmLevel::Low,
            alarm_message: "gap".into(),
            max_gap_seconds: 1,
        }]);
        assert_eq!(storage.load_all().await.unwrap().len(), 1);
    }
}
