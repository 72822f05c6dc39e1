use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use auditwatch_alarms::{BroadcastAlarmSink, FanOutAlarmSink, LoggingAlarmSink, WebhookAlarmSink};
use auditwatch_core::SystemEvent;
use auditwatch_engine::engine::AnalyzerEngine;
use auditwatch_engine::metrics::MetricsCollector;
use auditwatch_engine::sink::AlarmSink;
use auditwatch_engine::storage::RuleStorage;
use auditwatch_storage::TomlRuleStorage;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::config::AppConfig;

pub(crate) fn build_alarm_sink(config: &AppConfig) -> Arc<dyn AlarmSink> {
    let mut sinks: Vec<Box<dyn AlarmSink>> =
        vec![Box::new(LoggingAlarmSink::new()), Box::new(BroadcastAlarmSink::new(256))];
    if let Some(webhook_url) = &config.webhook_url {
        sinks.push(Box::new(WebhookAlarmSink::new(webhook_url.clone())));
        info!(url = %webhook_url, "webhook alarm delivery enabled");
    }
    Arc::new(FanOutAlarmSink::new(sinks))
}

pub(crate) fn build_rule_storage(config: &AppConfig) -> Arc<dyn RuleStorage> {
    Arc::new(TomlRuleStorage::new(&config.rules_path))
}

/// Bring an engine up against `config.rules_path`, and feed it
/// newline-delimited `SystemEvent` JSON read from stdin until either stdin
/// closes or the operator hits Ctrl-C.
pub async fn start_command(config_path: PathBuf) -> Result<()> {
    println!("{}", style("Loading configuration...").cyan());
    let config = AppConfig::load_with_overrides(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    println!("{}", style("✓ configuration loaded").green());

    let metrics = Arc::new(MetricsCollector::new().context("failed to create metrics collector")?);
    let alarm_sink = build_alarm_sink(&config);
    let rule_storage = build_rule_storage(&config);

    let engine = AnalyzerEngine::with_config(
        alarm_sink,
        rule_storage,
        metrics,
        config.engine.to_engine_config(),
    );

    let mut diagnostics = engine.subscribe_engine_messages();
    tokio::spawn(async move {
        while let Ok(message) = diagnostics.recv().await {
            info!(at = %message.timestamp, "{}", message.text);
        }
    });

    engine.start().await.context("failed to start the engine")?;
    println!(
        "{} engine started ({} analyzer(s) loaded from {})",
        style("✓").green(),
        engine.list_analyzers().await.len(),
        config.rules_path
    );

    println!(
        "{}",
        style("Reading events as newline-delimited JSON from stdin (Ctrl-C to stop)...").dim()
    );

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<SystemEvent>(&line) {
                            Ok(event) => {
                                if let Err(e) = engine.enqueue(event).await {
                                    warn!(error = %e, "failed to enqueue event");
                                }
                            }
                            Err(e) => warn!(error = %e, "skipping malformed event line"),
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "error reading stdin");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", style("shutting down...").yellow());
                break;
            }
        }
    }

    engine.stop().await.context("engine failed to stop cleanly")?;
    println!("{}", style("✓ engine stopped").green());
    Ok(())
}
