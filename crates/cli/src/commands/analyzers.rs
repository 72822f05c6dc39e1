use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use auditwatch_engine::engine::AnalyzerEngine;
use auditwatch_engine::metrics::MetricsCollector;
use console::style;

use crate::commands::start::{build_alarm_sink, build_rule_storage};
use crate::config::AppConfig;

/// Start an engine against the configured rule storage just long enough to
/// report which analyzers it would run and in what state, then stop it.
pub async fn analyzers_list_command(config_path: PathBuf) -> Result<()> {
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
    let analyzers = engine.list_analyzers().await;
    engine.stop().await.context("engine failed to stop cleanly")?;

    if analyzers.is_empty() {
        println!("{}", style("no analyzers (storage names no programs)").dim());
        return Ok(());
    }

    for (program_name, state) in analyzers {
        println!("{}  {:?}", style(program_name).bold(), state);
    }
    Ok(())
}
