//! The `AnalyzeRule` trait: one self-contained analysis over a program's event stream.

use async_trait::async_trait;
use auditwatch_core::{AlarmLevel, AlarmMessage, SystemEvent};
use tokio::sync::mpsc;

/// Channel a timer-driven rule uses to raise an alarm outside the normal
/// add-and-check call path. See `TimeBetweenOperationsRule` for the one
/// built-in rule that needs this.
pub type AlarmObserver = mpsc::UnboundedSender<AlarmMessage>;

/// A single analysis a `ProgramAnalyzer` runs against its event stream.
///
/// Implementations own whatever state the analysis needs (a sliding window
/// of timestamps, a last-seen clock) behind interior mutability, since rules
/// are shared as `Arc<dyn AnalyzeRule>` and evaluated concurrently.
#[async_trait]
pub trait AnalyzeRule: Send + Sync {
    /// Unique name within the owning `RuleSet`.
    fn rule_name(&self) -> &str;

    /// Application this rule was defined for.
    fn program_name(&self) -> &str;

    /// Operation this rule restricts to, or `None` to match every operation.
    fn operation_name(&self) -> Option<&str>;

    fn alarm_level(&self) -> AlarmLevel;

    /// Human summary attached to any alarm this rule raises.
    fn alarm_message(&self) -> &str;

    /// Whether `operation_name` matches this rule's operation filter.
    fn matches_operation(&self, operation_name: &str) -> bool {
        match self.operation_name() {
            Some(op) => op == operation_name,
            None => true,
        }
    }

    /// Fold `event` into this rule's state and report whether it just
    /// crossed into a triggering condition.
    async fn add_and_check_if_triggered(&self, event: &SystemEvent) -> bool;

    /// Clear all accumulated state, as if the rule had just been installed.
    fn reset(&self);

    /// Register the channel a timer-driven rule uses to raise an alarm
    /// independent of `add_and_check_if_triggered`. Rules with no background
    /// timer ignore this.
    fn attach_observer(&self, _observer: AlarmObserver) {}

    /// Cancel any background timer owned by this rule. Called when the rule
    /// is replaced or the owning `RuleSet` is unloaded.
    fn cancel_timer(&self) {}
}
