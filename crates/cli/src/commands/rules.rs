use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use auditwatch_engine::engine::AnalyzerEngine;
use auditwatch_engine::metrics::MetricsCollector;
use auditwatch_engine::storage::RuleStorage;
use auditwatch_storage::TomlRuleStorage;
use console::style;

use crate::commands::start::{build_alarm_sink, build_rule_storage};
use crate::config::AppConfig;

pub async fn rules_list_command(config_path: PathBuf) -> Result<()> {
    let config = AppConfig::load_with_overrides(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let storage = TomlRuleStorage::new(&config.rules_path);
    let definitions = storage
        .load_all()
        .await
        .with_context(|| format!("failed to read rules from {}", config.rules_path))?;

    if definitions.is_empty() {
        println!("{}", style("no rules defined").dim());
        return Ok(());
    }

    for definition in &definitions {
        println!(
            "{}  {}  {}",
            style(definition.rule_name()).bold(),
            style(definition.program_name()).cyan(),
            match definition {
                auditwatch_engine::storage::RuleDefinition::ThresholdWithinWindow {
                    threshold,
                    window_seconds,
                    ..
                } => format!("threshold-within-window ({threshold} in {window_seconds}s)"),
                auditwatch_engine::storage::RuleDefinition::TimeBetweenOperations {
                    max_gap_seconds,
                    ..
                } => format!("time-between-operations (max gap {max_gap_seconds}s)"),
            }
        );
    }

    Ok(())
}

/// Start an engine, ask it to reload the named program's rules from
/// storage, report how many were installed, then stop it. Demonstrates
/// `AnalyzerEngine::reload_rules` as a standalone operator action since this
/// process owns no long-lived engine between invocations.
pub async fn rules_reload_command(config_path: PathBuf, program_name: String) -> Result<()> {
    let config = AppConfig::load_with_overrides(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let metrics = Arc::new(MetricsCollector::new().context("failed to create metrics collector")?);
    let engine = AnalyzerEngine::with_config(
        build_alarm_sink(&config),
        build_rule_storage(&config),
        metrics,
        config.engine.to_engine_config(),
    );

    engine.start().await.context("failed to start the engine")?;
    let installed = engine
        .reload_rules(&program_name)
        .await
        .with_context(|| format!("failed to reload rules for '{program_name}'"))?;
    engine.stop().await.context("engine failed to stop cleanly")?;

    println!(
        "{} {} rule(s) reloaded for '{}'",
        style("✓").green(),
        installed,
        program_name
    );
    Ok(())
}
