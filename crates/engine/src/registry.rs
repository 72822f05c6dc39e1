//! Concurrent-safe map from application name to its `ProgramAnalyzer`.

use std::sync::Arc;

use auditwatch_core::ComponentState;
use dashmap::DashMap;

use crate::analyzer::{AnalyzerConfig, ProgramAnalyzer};
use crate::metrics::MetricsCollector;
use crate::sink::AlarmSink;

/// Owns every analyzer the engine has created, keyed by application name.
///
/// `get_or_create` is the one entry point that matters for correctness: two
/// concurrent calls for the same never-before-seen application must not
/// race each other into creating two analyzers. `DashMap`'s entry API gives
/// us that atomically, without a check-then-insert window.
pub struct AnalyzerRegistry {
    analyzers: DashMap<String, Arc<ProgramAnalyzer>>,
    alarm_sink: Arc<dyn AlarmSink>,
    metrics: Arc<MetricsCollector>,
    analyzer_config: AnalyzerConfig,
}

impl AnalyzerRegistry {
    pub fn new(alarm_sink: Arc<dyn AlarmSink>, metrics: Arc<MetricsCollector>) -> Self {
        Self::with_config(alarm_sink, metrics, AnalyzerConfig::default())
    }

    pub fn with_config(
        alarm_sink: Arc<dyn AlarmSink>,
        metrics: Arc<MetricsCollector>,
        analyzer_config: AnalyzerConfig,
    ) -> Self {
        Self {
            analyzers: DashMap::new(),
            alarm_sink,
            metrics,
            analyzer_config,
        }
    }

    /// Return the analyzer for `program_name`, creating a rule-less one
    /// (not yet started) if this is the first time it's been seen.
    pub fn get_or_create(&self, program_name: &str) -> Arc<ProgramAnalyzer> {
        self.analyzers
            .entry(program_name.to_string())
            .or_insert_with(|| {
                ProgramAnalyzer::with_config(
                    program_name,
                    Arc::clone(&self.alarm_sink),
                    Arc::clone(&self.metrics),
                    self.analyzer_config,
                )
            })
            .clone()
    }

    pub fn get(&self, program_name: &str) -> Option<Arc<ProgramAnalyzer>> {
        self.analyzers.get(program_name).map(|entry| entry.clone())
    }

    pub async fn list(&self) -> Vec<(String, ComponentState)> {
        let analyzers: Vec<Arc<ProgramAnalyzer>> = self.analyzers.iter().map(|e| e.clone()).collect();
        let mut out = Vec::with_capacity(analyzers.len());
        for analyzer in analyzers {
            out.push((analyzer.program_name().to_string(), analyzer.state().await));
        }
        out
    }

    pub async fn stop_all(&self) {
        let analyzers: Vec<Arc<ProgramAnalyzer>> = self.analyzers.iter().map(|e| e.clone()).collect();
        for analyzer in analyzers {
            analyzer.stop_analyzer().await;
        }
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use auditwatch_core::AlarmMessage;

    struct NullSink;

    #[async_trait]
    impl AlarmSink for NullSink {
        async fn raise_alarm(&self, _alarm: AlarmMessage) -> Result<(), crate::sink::AlarmSinkError> {
            Ok(())
        }
    }

    fn registry() -> AnalyzerRegistry {
        AnalyzerRegistry::new(Arc::new(NullSink), Arc::new(MetricsCollector::new().unwrap()))
    }

    #[test]
    fn get_or_create_returns_the_same_analyzer_for_repeated_calls() {
        let registry = registry();
        let a = registry.get_or_create("billing");
        let b = registry.get_or_create("billing");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_programs_get_distinct_analyzers() {
        let registry = registry();
        registry.get_or_create("billing");
        registry.get_or_create("payments");
        assert_eq!(registry.len(), 2);
    }
}
