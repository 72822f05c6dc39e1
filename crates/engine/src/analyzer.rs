//! Per-application analyzer: a private event queue paired with a mutable
//! rule set, evaluated by its own task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use auditwatch_core::{AlarmLevel, AlarmMessage, ComponentState, SystemEvent};
use tokio::sync::{mpsc, Mutex as AsyncMutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::metrics::MetricsCollector;
use crate::rule::{AlarmObserver, AnalyzeRule};
use crate::ruleset::RuleSet;
use crate::sink::AlarmSink;

/// How long an analyzer sleeps after observing an empty queue before
/// checking again.
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(25);

/// Upper bound on rules evaluated concurrently for a single event.
pub const DEFAULT_MAX_CONCURRENT_RULES: usize = 64;

/// Tunables handed to every analyzer a registry creates.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerConfig {
    pub idle_poll_interval: Duration,
    pub max_concurrent_rules: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            idle_poll_interval: DEFAULT_IDLE_POLL,
            max_concurrent_rules: DEFAULT_MAX_CONCURRENT_RULES,
        }
    }
}

pub struct ProgramAnalyzer {
    program_name: String,
    rule_set: RwLock<RuleSet>,
    queue_tx: mpsc::UnboundedSender<SystemEvent>,
    queue_rx: AsyncMutex<mpsc::UnboundedReceiver<SystemEvent>>,
    state: RwLock<ComponentState>,
    alarm_sink: Arc<dyn AlarmSink>,
    supervisor: AsyncMutex<Option<JoinHandle<()>>>,
    /// Channel every rule installed into `rule_set` gets attached to via
    /// `attach_observer`, for alarms raised off the normal event-processing
    /// path (timer-driven rules firing on idle timeout).
    alarm_observer_tx: AlarmObserver,
    alarm_observer_rx: AsyncMutex<Option<mpsc::UnboundedReceiver<AlarmMessage>>>,
    observer_forwarder: AsyncMutex<Option<JoinHandle<()>>>,
    metrics: Arc<MetricsCollector>,
    idle_poll_interval: Duration,
    max_concurrent_rules: usize,
}

impl ProgramAnalyzer {
    pub fn new(
        program_name: impl Into<String>,
        alarm_sink: Arc<dyn AlarmSink>,
        metrics: Arc<MetricsCollector>,
    ) -> Arc<Self> {
        Self::with_config(program_name, alarm_sink, metrics, AnalyzerConfig::default())
    }

    pub fn with_config(
        program_name: impl Into<String>,
        alarm_sink: Arc<dyn AlarmSink>,
        metrics: Arc<MetricsCollector>,
        config: AnalyzerConfig,
    ) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (alarm_observer_tx, alarm_observer_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            program_name: program_name.into(),
            rule_set: RwLock::new(RuleSet::new()),
            queue_tx,
            queue_rx: AsyncMutex::new(queue_rx),
            state: RwLock::new(ComponentState::Stopped),
            alarm_sink,
            supervisor: AsyncMutex::new(None),
            alarm_observer_tx,
            alarm_observer_rx: AsyncMutex::new(Some(alarm_observer_rx)),
            observer_forwarder: AsyncMutex::new(None),
            metrics,
            idle_poll_interval: config.idle_poll_interval,
            max_concurrent_rules: config.max_concurrent_rules,
        })
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    pub async fn state(&self) -> ComponentState {
        *self.state.read().await
    }

    /// Enqueue an event for this analyzer to evaluate. The queue is
    /// unbounded by design: back-pressure, if wanted, belongs to the
    /// engine's ingest queue, not to any one analyzer.
    pub fn add_event(&self, event: SystemEvent) {
        if self.queue_tx.send(event).is_err() {
            warn!(program = %self.program_name, "analyzer queue receiver dropped; event lost");
        }
    }

    pub async fn add_or_replace_rule(&self, rule: Arc<dyn AnalyzeRule>) -> EngineResult<()> {
        rule.attach_observer(self.alarm_observer_tx.clone());
        let mut rule_set = self.rule_set.write().await;
        rule_set.add_or_replace(&self.program_name, rule)
    }

    pub async fn unload_all_rules(&self) {
        self.rule_set.write().await.unload_all();
    }

    pub async fn rule_names(&self) -> Vec<String> {
        self.rule_set.read().await.rule_names()
    }

    pub async fn rule_count(&self) -> usize {
        self.rule_set.read().await.len()
    }

    /// Request a drain-and-stop. The analyzer keeps evaluating whatever is
    /// already queued and transitions to Stopped once the queue runs dry.
    pub async fn stop_analyzer(&self) {
        let mut state = self.state.write().await;
        if *state == ComponentState::Running {
            *state = ComponentState::ShuttingDown;
            info!(program = %self.program_name, "analyzer draining before stop");
        }
    }

    /// Launch the evaluation loop. Idempotent: a no-op if already Running.
    pub async fn start_analyzer_task(self: &Arc<Self>) {
        {
            let state = self.state.read().await;
            if *state == ComponentState::Running {
                return;
            }
        }

        self.ensure_observer_forwarder_running().await;

        *self.state.write().await = ComponentState::Running;

        let inner_analyzer = Arc::clone(self);
        let inner_handle = tokio::spawn(async move {
            inner_analyzer.run().await;
        });

        let supervised_analyzer = Arc::clone(self);
        let supervisor_handle = tokio::spawn(async move {
            if let Err(join_err) = inner_handle.await {
                error!(
                    program = %supervised_analyzer.program_name,
                    error = %join_err,
                    "analyzer task crashed"
                );
                *supervised_analyzer.state.write().await = ComponentState::Stopped;
                let alarm = AlarmMessage::new(
                    AlarmLevel::Medium,
                    supervised_analyzer.program_name.clone(),
                    "__analyzer__",
                    format!(
                        "analyzer for '{}' crashed and stopped: {join_err}",
                        supervised_analyzer.program_name
                    ),
                );
                let _ = supervised_analyzer.alarm_sink.raise_alarm(alarm).await;
            }
        });

        *self.supervisor.lock().await = Some(supervisor_handle);
    }

    /// Spawn the task that drains timer-raised alarms and forwards them to
    /// the alarm sink, once per analyzer. Independent of the Running/Stopped
    /// evaluation-loop lifecycle: a rule's background timer can fire (and
    /// needs its alarm delivered) even while the analyzer itself is between
    /// runs.
    async fn ensure_observer_forwarder_running(self: &Arc<Self>) {
        let mut forwarder = self.observer_forwarder.lock().await;
        if forwarder.is_some() {
            return;
        }
        let Some(mut alarm_rx) = self.alarm_observer_rx.lock().await.take() else {
            return;
        };

        let analyzer = Arc::clone(self);
        *forwarder = Some(tokio::spawn(async move {
            while let Some(alarm) = alarm_rx.recv().await {
                analyzer
                    .metrics
                    .record_alarm(&alarm.rule_name, alarm.level.as_str());
                if let Err(e) = analyzer.alarm_sink.raise_alarm(alarm).await {
                    warn!(program = %analyzer.program_name, error = %e, "failed to publish timer-raised alarm");
                }
            }
        }));
    }

    async fn run(self: Arc<Self>) {
        loop {
            let current_state = *self.state.read().await;

            let next_event = {
                let mut rx = self.queue_rx.lock().await;
                rx.try_recv().ok()
            };

            match next_event {
                Some(event) => {
                    self.metrics.record_event(&event.application_name);
                    if let Err(e) = self.process_event(&event).await {
                        error!(program = %self.program_name, error = %e, "rule evaluation fault");
                        let alarm = AlarmMessage::new(
                            AlarmLevel::Medium,
                            self.program_name.clone(),
                            "__analyzer__",
                            format!("rule evaluation fault: {e}"),
                        );
                        let _ = self.alarm_sink.raise_alarm(alarm).await;
                    }
                }
                None => {
                    if current_state == ComponentState::ShuttingDown {
                        break;
                    }
                    tokio::time::sleep(self.idle_poll_interval).await;
                }
            }
        }

        *self.state.write().await = ComponentState::Stopped;
        info!(program = %self.program_name, "analyzer stopped");
    }

    async fn process_event(&self, event: &SystemEvent) -> EngineResult<()> {
        let matching = {
            let rule_set = self.rule_set.read().await;
            rule_set.matching(&event.operation_name)
        };

        if matching.is_empty() {
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_rules));
        let mut tasks = Vec::with_capacity(matching.len());

        for rule in matching {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| EngineError::Internal("rule evaluation semaphore closed".into()))?;
            let event = event.clone();
            let metrics = Arc::clone(&self.metrics);
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let started = Instant::now();
                let triggered = rule.add_and_check_if_triggered(&event).await;
                metrics.record_rule_evaluation(rule.rule_name(), started.elapsed(), triggered);
                (rule, triggered)
            }));
        }

        for task in tasks {
            let (rule, triggered) = task
                .await
                .map_err(|e| EngineError::RuleEvaluationFault(e.to_string()))?;
            if triggered {
                self.publish_alarm(&rule, event).await;
            }
        }

        Ok(())
    }

    async fn publish_alarm(&self, rule: &Arc<dyn AnalyzeRule>, event: &SystemEvent) {
        let mut alarm = AlarmMessage::new(
            rule.alarm_level(),
            self.program_name.clone(),
            rule.rule_name().to_string(),
            rule.alarm_message().to_string(),
        )
        .with_event_id(event.id.clone());

        if let Some(message) = event.error_message() {
            alarm = alarm.with_detail(message.to_string());
        }

        self.metrics
            .record_alarm(rule.rule_name(), rule.alarm_level().as_str());

        if let Err(e) = self.alarm_sink.raise_alarm(alarm).await {
            warn!(rule = rule.rule_name(), error = %e, "failed to publish alarm");
        }
        debug!(rule = rule.rule_name(), program = %self.program_name, "alarm raised");
    }
}
