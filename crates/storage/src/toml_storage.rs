//! Reads and writes rule definitions as a single TOML document on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use auditwatch_engine::storage::{RuleDefinition, RuleStorage, StorageError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BackendError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleDefinition>,
}

/// A `RuleStorage` backed by one TOML file. The whole file is read and
/// rewritten on every operation: rule sets are small and change rarely, so
/// there's no need for incremental updates.
pub struct TomlRuleStorage {
    path: PathBuf,
}

impl TomlRuleStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_file(&self) -> Result<RuleFile, BackendError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => toml::from_str(&contents).map_err(|source| BackendError::Parse {
                path: self.path.display().to_string(),
                source,
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(RuleFile::default()),
            Err(source) => Err(BackendError::Read {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }

    pub async fn save_all(&self, definitions: Vec<RuleDefinition>) -> Result<(), BackendError> {
        let file = RuleFile { rules: definitions };
        let contents = toml::to_string_pretty(&file)?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|source| BackendError::Write {
                path: self.path.display().to_string(),
                source,
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RuleStorage for TomlRuleStorage {
    async fn load_all(&self) -> Result<Vec<RuleDefinition>, StorageError> {
        let file = self.read_file().await?;
        debug!(path = %self.path.display(), count = file.rules.len(), "loaded rule definitions");
        Ok(file.rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditwatch_core::AlarmLevel;

    fn sample_rule() -> RuleDefinition {
        RuleDefinition::ThresholdWithinWindow {
            rule_name: "r1".into(),
            program_name: "billing".into(),
            operation_name: None,
            alarm_level: AlarmLevel::High,
            alarm_message: "too many failures".into(),
            threshold: 3,
            window_seconds: 60,
            failures_only: true,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TomlRuleStorage::new(dir.path().join("rules.toml"));
        let definitions = storage.load_all().await.unwrap();
        assert!(definitions.is_empty());
    }

    #[tokio::test]
    async fn round_trips_definitions_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TomlRuleStorage::new(dir.path().join("rules.toml"));

        storage.save_all(vec![sample_rule()]).await.unwrap();
        let loaded = storage.load_all().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].rule_name(), "r1");
    }
}
