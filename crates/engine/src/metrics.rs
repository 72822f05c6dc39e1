//! Prometheus-backed metrics for the engine, exposed as a registry handle
//! rather than bound to any HTTP port — scraping is an operator concern.

use std::time::Duration;

use prometheus::{HistogramVec, IntCounterVec, IntGauge, Registry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    RegistrationFailed(#[from] prometheus::Error),
}

/// Collects the engine's operational metrics.
///
/// Cheap to clone: every field is a prometheus handle or an `Arc`-backed
/// registry, so analyzers and the dispatch loop can each hold their own copy.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    registry: Registry,
    events_processed_total: IntCounterVec,
    rule_evaluations_total: IntCounterVec,
    alarms_total: IntCounterVec,
    rule_evaluation_duration: HistogramVec,
    active_analyzers: IntGauge,
}

impl MetricsCollector {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let events_processed_total = IntCounterVec::new(
            prometheus::Opts::new(
                "auditwatch_events_processed_total",
                "Events ingested by the engine, by application",
            ),
            &["application"],
        )?;

        let rule_evaluations_total = IntCounterVec::new(
            prometheus::Opts::new(
                "auditwatch_rule_evaluations_total",
                "Rule evaluations performed, by rule and outcome",
            ),
            &["rule", "triggered"],
        )?;

        let alarms_total = IntCounterVec::new(
            prometheus::Opts::new("auditwatch_alarms_total", "Alarms raised, by rule and level"),
            &["rule", "level"],
        )?;

        let rule_evaluation_duration = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "auditwatch_rule_evaluation_duration_seconds",
                "Time spent evaluating a single rule against a single event",
            ),
            &["rule"],
        )?;

        let active_analyzers = IntGauge::new(
            "auditwatch_active_analyzers",
            "Number of analyzers currently in the Running state",
        )?;

        registry.register(Box::new(events_processed_total.clone()))?;
        registry.register(Box::new(rule_evaluations_total.clone()))?;
        registry.register(Box::new(alarms_total.clone()))?;
        registry.register(Box::new(rule_evaluation_duration.clone()))?;
        registry.register(Box::new(active_analyzers.clone()))?;

        Ok(Self {
            registry,
            events_processed_total,
            rule_evaluations_total,
            alarms_total,
            rule_evaluation_duration,
            active_analyzers,
        })
    }

    /// The underlying prometheus registry, for an operator to mount behind
    /// whatever `/metrics` endpoint their deployment already exposes.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_event(&self, application_name: &str) {
        self.events_processed_total
            .with_label_values(&[application_name])
            .inc();
    }

    pub fn record_rule_evaluation(&self, rule_name: &str, duration: Duration, triggered: bool) {
        self.rule_evaluations_total
            .with_label_values(&[rule_name, if triggered { "true" } else { "false" }])
            .inc();
        self.rule_evaluation_duration
            .with_label_values(&[rule_name])
            .observe(duration.as_secs_f64());
    }

    pub fn record_alarm(&self, rule_name: &str, level: &str) {
        self.alarms_total.with_label_values(&[rule_name, level]).inc();
    }

    pub fn set_active_analyzers(&self, count: i64) {
        self.active_analyzers.set(count);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_analyzers: self.active_analyzers.get(),
        }
    }
}

/// A point-in-time summary of the gauges that don't otherwise need a
/// prometheus scrape to inspect, e.g. from the CLI's `status` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub active_analyzers: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_events_and_alarms_without_panicking() {
        let metrics = MetricsCollector::new().unwrap();
        metrics.record_event("billing");
        metrics.record_rule_evaluation("r1", Duration::from_millis(5), true);
        metrics.record_alarm("r1", "high");
        metrics.set_active_analyzers(2);
        assert_eq!(metrics.snapshot().active_analyzers, 2);
    }
}
