//! # Audit Watch Core
//!
//! Shared data model for the health-and-audit analysis engine.
//!
//! This module provides:
//! - `SystemEvent`, the immutable observation ingested for every operation outcome
//! - `AlarmMessage` and `AlarmLevel`, raised when a rule triggers
//! - `EngineMessage`, operator-facing diagnostics distinct from alarms
//! - `ComponentState`, the Stopped/Running/ShuttingDown lifecycle shared by the
//!   engine and every analyzer

pub mod alarm;
pub mod error;
pub mod event;
pub mod state;

pub use alarm::*;
pub use error::*;
pub use event::*;
pub use state::*;
