//! `AnalyzerEngine`: the ingest queue, the analyzer registry, and the
//! start/stop lifecycle that ties them together.

use std::sync::Arc;
use std::time::Duration;

use auditwatch_core::{AlarmMessage, ComponentState, EngineMessage, SystemEvent};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analyzer::AnalyzerConfig;
use crate::error::{EngineError, EngineResult};
use crate::metrics::MetricsCollector;
use crate::registry::AnalyzerRegistry;
use crate::rule::AnalyzeRule;
use crate::sink::AlarmSink;
use crate::storage::{RuleDefinition, RuleStorage};

/// Depth of the engine's operator-facing diagnostic broadcast and the
/// shutdown grace period and analyzer tunables handed to the registry.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub engine_message_capacity: usize,
    pub shutdown_grace_period: Duration,
    pub analyzer: AnalyzerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_message_capacity: 256,
            shutdown_grace_period: Duration::from_secs(300),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

/// The top-level engine: on `start`, reads the full rule set from its
/// `RuleStorage`, builds one analyzer per program it names, then ingests
/// `SystemEvent`s and routes each to the analyzer for its application
/// (creating one rule-less analyzer on first sight of a program storage
/// never named).
pub struct AnalyzerEngine {
    config: EngineConfig,
    registry: Arc<AnalyzerRegistry>,
    rule_storage: Arc<dyn RuleStorage>,
    ingest_tx: mpsc::UnboundedSender<SystemEvent>,
    ingest_rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<SystemEvent>>>,
    state: RwLock<ComponentState>,
    dispatch_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    engine_messages_tx: broadcast::Sender<EngineMessage>,
    metrics: Arc<MetricsCollector>,
}

impl AnalyzerEngine {
    pub fn new(
        alarm_sink: Arc<dyn AlarmSink>,
        rule_storage: Arc<dyn RuleStorage>,
        metrics: Arc<MetricsCollector>,
    ) -> Arc<Self> {
        Self::with_config(alarm_sink, rule_storage, metrics, EngineConfig::default())
    }

    pub fn with_config(
        alarm_sink: Arc<dyn AlarmSink>,
        rule_storage: Arc<dyn RuleStorage>,
        metrics: Arc<MetricsCollector>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let (ingest_tx, ingest_rx) = mpsc::unbounded_channel();
        let (engine_messages_tx, _) = broadcast::channel(config.engine_message_capacity);
        let registry = Arc::new(AnalyzerRegistry::with_config(
            alarm_sink,
            Arc::clone(&metrics),
            config.analyzer,
        ));

        Arc::new(Self {
            config,
            registry,
            rule_storage,
            ingest_tx,
            ingest_rx: tokio::sync::Mutex::new(Some(ingest_rx)),
            state: RwLock::new(ComponentState::Stopped),
            dispatch_task: tokio::sync::Mutex::new(None),
            engine_messages_tx,
            metrics,
        })
    }

    pub async fn state(&self) -> ComponentState {
        *self.state.read().await
    }

    /// Read the full rule set, build one analyzer per program it names and
    /// start each, then start the dispatch task. A usage error to call
    /// unless the engine is currently Stopped.
    pub async fn start(self: &Arc<Self>) -> EngineResult<()> {
        {
            let state = self.state.read().await;
            if *state != ComponentState::Stopped {
                return Err(EngineError::EngineFault(
                    "start called while the engine is not Stopped".into(),
                ));
            }
        }

        let installed = self.install_all_rules().await?;
        if installed == 0 {
            info!("starting with no rules loaded from storage");
        }
        for (program_name, _) in self.registry.list().await {
            if let Some(analyzer) = self.registry.get(&program_name) {
                analyzer.start_analyzer_task().await;
            }
        }

        let mut ingest_rx = self.ingest_rx.lock().await.take().ok_or_else(|| {
            EngineError::EngineFault("ingest queue already owned by a running dispatch task".into())
        })?;

        *self.state.write().await = ComponentState::Running;

        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match ingest_rx.try_recv() {
                    Ok(event) => {
                        engine.route_event(event).await;
                        continue;
                    }
                    Err(mpsc::error::TryRecvError::Disconnected) => break,
                    Err(mpsc::error::TryRecvError::Empty) => {}
                }

                if *engine.state.read().await == ComponentState::ShuttingDown {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            engine.registry.stop_all().await;
            *engine.ingest_rx.lock().await = Some(ingest_rx);
        });

        *self.dispatch_task.lock().await = Some(handle);
        self.emit_message("engine started");
        Ok(())
    }

    /// Load every definition from `rule_storage`, grouped by program, and
    /// install each into its (possibly freshly created) analyzer. Shared by
    /// `start` and `reload_rules`.
    async fn install_all_rules(&self) -> EngineResult<usize> {
        let definitions = self
            .rule_storage
            .load_all()
            .await
            .map_err(|e| EngineError::EngineFault(format!("rule storage read failed: {e}")))?;

        let mut by_program: std::collections::HashMap<String, Vec<RuleDefinition>> =
            std::collections::HashMap::new();
        for definition in definitions {
            by_program
                .entry(definition.program_name().to_string())
                .or_default()
                .push(definition);
        }

        let mut installed = 0;
        for (program_name, definitions) in by_program {
            let analyzer = self.registry.get_or_create(&program_name);
            for definition in &definitions {
                let rule: Arc<dyn AnalyzeRule> = crate::storage::build_rule(definition);
                if let Err(e) = analyzer.add_or_replace_rule(rule).await {
                    warn!(program = %program_name, error = %e, "dropping rule on load");
                    continue;
                }
                installed += 1;
            }
        }
        Ok(installed)
    }

    async fn route_event(&self, event: SystemEvent) {
        let analyzer = self.registry.get_or_create(&event.application_name);
        analyzer.start_analyzer_task().await;
        analyzer.add_event(event);
        self.metrics.set_active_analyzers(self.registry.len() as i64);
    }

    /// Submit an event for analysis. Fails if the engine isn't running.
    pub async fn enqueue(&self, event: SystemEvent) -> EngineResult<()> {
        if !self.state.read().await.is_running() {
            return Err(EngineError::EngineNotRunning);
        }
        self.ingest_tx
            .send(event)
            .map_err(|_| EngineError::EngineFault("ingest queue receiver dropped".into()))
    }

    /// Request a graceful shutdown. The dispatch task observes the
    /// ShuttingDown state, drains whatever remains in the ingest queue, and
    /// only then asks every analyzer to stop (see the dispatch loop in
    /// `start`). Once the dispatch task has exited, this waits, polling,
    /// until every analyzer reports Stopped or `shutdown_grace_period`
    /// elapses; a timeout is reported via an `EngineMessage`, not an alarm.
    pub async fn stop(self: &Arc<Self>) -> EngineResult<()> {
        {
            let mut state = self.state.write().await;
            if *state != ComponentState::Running {
                return Ok(());
            }
            *state = ComponentState::ShuttingDown;
        }

        let handle = self.dispatch_task.lock().await.take();
        if let Some(handle) = handle {
            match tokio::time::timeout(self.config.shutdown_grace_period, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    return Err(EngineError::EngineFault(format!(
                        "dispatch task crashed during shutdown: {join_err}"
                    )))
                }
                Err(_) => {
                    self.emit_message("shutdown exceeded grace period; dispatch task still draining");
                    return Ok(());
                }
            }
        }

        if !self.wait_for_all_analyzers_stopped().await {
            self.emit_message("shutdown exceeded grace period; analyzers still draining");
            return Ok(());
        }

        *self.state.write().await = ComponentState::Stopped;
        self.emit_message("engine stopped");
        Ok(())
    }

    /// Poll every known analyzer until all report Stopped, or
    /// `shutdown_grace_period` elapses first. Returns whether all analyzers
    /// were observed Stopped before the deadline.
    async fn wait_for_all_analyzers_stopped(&self) -> bool {
        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace_period;
        loop {
            let analyzers = self.registry.list().await;
            if analyzers
                .iter()
                .all(|(_, state)| *state == ComponentState::Stopped)
            {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop the named analyzer, wait for it to drain, clear its rules,
    /// re-read that program's definitions from storage, install them, and
    /// restart it. Creates the analyzer if it didn't already exist. Returns
    /// the number of rules installed for `program_name`.
    pub async fn reload_rules(&self, program_name: &str) -> EngineResult<usize> {
        let analyzer = self.registry.get_or_create(program_name);
        analyzer.stop_analyzer().await;
        self.wait_until_stopped(&analyzer).await?;
        analyzer.unload_all_rules().await;

        let definitions = self
            .rule_storage
            .load_all()
            .await
            .map_err(|e| EngineError::EngineFault(format!("rule storage read failed: {e}")))?;

        let mut installed = 0;
        for definition in definitions
            .iter()
            .filter(|d| d.program_name() == program_name)
        {
            let rule: Arc<dyn AnalyzeRule> = crate::storage::build_rule(definition);
            if let Err(e) = analyzer.add_or_replace_rule(rule).await {
                warn!(program = program_name, error = %e, "dropping rule on reload");
                continue;
            }
            installed += 1;
        }

        analyzer.start_analyzer_task().await;
        self.emit_message(&format!("reloaded {installed} rules for '{program_name}'"));
        Ok(installed)
    }

    async fn wait_until_stopped(&self, analyzer: &crate::analyzer::ProgramAnalyzer) -> EngineResult<()> {
        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace_period;
        while analyzer.state().await != ComponentState::Stopped {
            if tokio::time::Instant::now() >= deadline {
                return Err(EngineError::ShutdownTimeout);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    pub async fn list_analyzers(&self) -> Vec<(String, ComponentState)> {
        self.registry.list().await
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Subscribe to operator-facing diagnostics. Distinct from alarms: these
    /// are for watching the engine itself, not for paging anyone.
    pub fn subscribe_engine_messages(&self) -> broadcast::Receiver<EngineMessage> {
        self.engine_messages_tx.subscribe()
    }

    fn emit_message(&self, text: &str) {
        info!(message = text, "engine diagnostic");
        let _ = self
            .engine_messages_tx
            .send(EngineMessage::new(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use auditwatch_core::EventOutcome;

    struct NullSink;

    #[async_trait]
    impl AlarmSink for NullSink {
        async fn raise_alarm(&self, _alarm: AlarmMessage) -> Result<(), crate::sink::AlarmSinkError> {
            Ok(())
        }
    }

    struct EmptyStorage;

    #[async_trait]
    impl RuleStorage for EmptyStorage {
        async fn load_all(&self) -> Result<Vec<RuleDefinition>, StorageError> {
            Ok(vec![])
        }
    }

    struct OneRuleStorage;

    #[async_trait]
    impl RuleStorage for OneRuleStorage {
        async fn load_all(&self) -> Result<Vec<RuleDefinition>, StorageError> {
            Ok(vec![RuleDefinition::ThresholdWithinWindow {
                rule_name: "r1".into(),
                program_name: "billing".into(),
                operation_name: None,
                alarm_level: auditwatch_core::AlarmLevel::Low,
                alarm_message: "too many events".into(),
                threshold: 5,
                window_seconds: 60,
                failures_only: false,
            }])
        }
    }

    fn engine() -> Arc<AnalyzerEngine> {
        AnalyzerEngine::new(
            Arc::new(NullSink),
            Arc::new(EmptyStorage),
            Arc::new(MetricsCollector::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn enqueue_fails_before_start() {
        let engine = engine();
        let err = engine
            .enqueue(SystemEvent::new("billing", "charge-card", EventOutcome::Success))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EngineNotRunning));
    }

    #[tokio::test]
    async fn starting_twice_is_a_usage_error() {
        let engine = engine();
        engine.start().await.unwrap();
        assert!(engine.start().await.is_err());
    }

    #[tokio::test]
    async fn start_installs_rules_from_storage_before_running() {
        let engine = AnalyzerEngine::new(
            Arc::new(NullSink),
            Arc::new(OneRuleStorage),
            Arc::new(MetricsCollector::new().unwrap()),
        );
        engine.start().await.unwrap();
        let analyzers = engine.list_analyzers().await;
        assert_eq!(analyzers.len(), 1);
        assert_eq!(analyzers[0].0, "billing");
    }

    #[tokio::test]
    async fn auto_creates_an_analyzer_on_first_event() {
        let engine = engine();
        engine.start().await.unwrap();
        engine
            .enqueue(SystemEvent::new("billing", "charge-card", EventOutcome::Success))
            .await
            .unwrap();

        let mut analyzers = Vec::new();
        for _ in 0..50 {
            analyzers = engine.list_analyzers().await;
            if !analyzers.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(analyzers.len(), 1);
        assert_eq!(analyzers[0].0, "billing");
    }

    #[tokio::test]
    async fn reload_rules_installs_definitions_scoped_to_one_program() {
        let engine = AnalyzerEngine::new(
            Arc::new(NullSink),
            Arc::new(OneRuleStorage),
            Arc::new(MetricsCollector::new().unwrap()),
        );
        engine.start().await.unwrap();
        let installed = engine.reload_rules("billing").await.unwrap();
        assert_eq!(installed, 1);
        let installed_other = engine.reload_rules("payments").await.unwrap();
        assert_eq!(installed_other, 0);
    }

    #[tokio::test]
    async fn stop_is_a_no_op_when_not_running() {
        let engine = engine();
        engine.stop().await.unwrap();
        assert_eq!(engine.state().await, ComponentState::Stopped);
    }

    #[tokio::test]
    async fn stop_waits_for_every_analyzer_to_reach_stopped() {
        let engine = engine();
        engine.start().await.unwrap();
        for i in 0..20 {
            engine
                .enqueue(SystemEvent::new("billing", format!("op-{i}"), EventOutcome::Success))
                .await
                .unwrap();
        }
        engine.stop().await.unwrap();

        assert_eq!(engine.state().await, ComponentState::Stopped);
        let analyzers = engine.list_analyzers().await;
        assert!(analyzers.iter().all(|(_, state)| *state == ComponentState::Stopped));
    }
}
