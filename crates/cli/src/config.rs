use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use auditwatch_engine::analyzer::AnalyzerConfig;
use auditwatch_engine::engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the `auditwatch` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where rule definitions are persisted between runs.
    #[serde(default = "default_rules_path")]
    pub rules_path: String,

    /// Webhook URL an alarm is also POSTed to, in addition to the log and
    /// broadcast sinks that are always active. Left unset to skip it.
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub app: AppSettings,
}

/// Serializable mirror of `auditwatch_engine::engine::EngineConfig` — plain
/// seconds on the wire, converted to `Duration` once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_engine_message_capacity")]
    pub engine_message_capacity: usize,

    #[serde(default = "default_shutdown_grace_period_seconds")]
    pub shutdown_grace_period_seconds: u64,

    #[serde(default = "default_analyzer_idle_poll_millis")]
    pub analyzer_idle_poll_millis: u64,

    #[serde(default = "default_max_concurrent_rules")]
    pub max_concurrent_rules: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            engine_message_capacity: default_engine_message_capacity(),
            shutdown_grace_period_seconds: default_shutdown_grace_period_seconds(),
            analyzer_idle_poll_millis: default_analyzer_idle_poll_millis(),
            max_concurrent_rules: default_max_concurrent_rules(),
        }
    }
}

impl EngineSettings {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            engine_message_capacity: self.engine_message_capacity,
            shutdown_grace_period: Duration::from_secs(self.shutdown_grace_period_seconds),
            analyzer: AnalyzerConfig {
                idle_poll_interval: Duration::from_millis(self.analyzer_idle_poll_millis),
                max_concurrent_rules: self.max_concurrent_rules,
            },
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.as_ref().display()))?;

        let mut config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.as_ref().display()))?;

        config
            .validate()
            .with_context(|| format!("invalid configuration in: {}", path.as_ref().display()))?;

        Ok(config)
    }

    pub fn load_with_overrides<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rules_path.is_empty() {
            anyhow::bail!("rules_path cannot be empty");
        }
        if self.engine.max_concurrent_rules == 0 {
            anyhow::bail!("engine.max_concurrent_rules must be at least 1");
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(log_level) = std::env::var("AUDITWATCH_LOG_LEVEL") {
            self.app.log_level = log_level;
        }
        if let Ok(webhook_url) = std::env::var("AUDITWATCH_WEBHOOK_URL") {
            self.webhook_url = Some(webhook_url);
        }
        if let Ok(rules_path) = std::env::var("AUDITWATCH_RULES_PATH") {
            self.rules_path = rules_path;
        }
    }

    pub fn default_for_testing() -> Self {
        Self {
            rules_path: default_rules_path(),
            webhook_url: None,
            engine: EngineSettings::default(),
            app: AppSettings::default(),
        }
    }
}

fn default_rules_path() -> String {
    "auditwatch-rules.toml".to_string()
}

fn default_engine_message_capacity() -> usize {
    256
}

fn default_shutdown_grace_period_seconds() -> u64 {
    300
}

fn default_analyzer_idle_poll_millis() -> u64 {
    25
}

fn default_max_concurrent_rules() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_config_with_defaults_filled_in() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "rules_path = \"rules.toml\"\n").unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.rules_path, "rules.toml");
        assert_eq!(config.engine.max_concurrent_rules, 64);
    }

    #[test]
    fn env_overrides_take_effect() {
        std::env::set_var("AUDITWATCH_LOG_LEVEL", "trace");
        let mut config = AppConfig::default_for_testing();
        config.apply_env_overrides();
        assert_eq!(config.app.log_level, "trace");
        std::env::remove_var("AUDITWATCH_LOG_LEVEL");
    }

    #[test]
    fn rejects_zero_max_concurrent_rules() {
        let mut config = AppConfig::default_for_testing();
        config.engine.max_concurrent_rules = 0;
        assert!(config.validate().is_err());
    }
}
