//! Lifecycle state shared by the engine and every analyzer.

use serde::{Deserialize, Serialize};

/// Linear lifecycle: Stopped → Running → ShuttingDown → Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentState {
    Stopped,
    Running,
    ShuttingDown,
}

impl ComponentState {
    pub fn is_running(&self) -> bool {
        matches!(self, ComponentState::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ComponentState::Stopped)
    }

    pub fn is_shutting_down(&self) -> bool {
        matches!(self, ComponentState::ShuttingDown)
    }
}

impl Default for ComponentState {
    fn default() -> Self {
        ComponentState::Stopped
    }
}
