//! # Audit Watch Engine
//!
//! The dispatch-and-analysis core of the health-and-audit analysis engine.
//!
//! This crate provides:
//! - [`AnalyzerEngine`], the ingest queue and analyzer registry lifecycle
//! - [`ProgramAnalyzer`], the per-application event queue and rule evaluator
//! - [`AnalyzeRule`] and its built-in [`ThresholdWithinWindowRule`] and
//!   [`TimeBetweenOperationsRule`] variants
//! - the [`AlarmSink`] and [`RuleStorage`] contracts external collaborators
//!   implement
//! - [`MetricsCollector`], the prometheus-backed operational metrics handle

pub mod analyzer;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod rule;
pub mod ruleset;
pub mod rules;
pub mod sink;
pub mod storage;

pub use analyzer::*;
pub use engine::*;
pub use error::*;
pub use metrics::*;
pub use registry::*;
pub use rule::*;
pub use ruleset::*;
pub use rules::threshold_within_window::*;
pub use rules::time_between_operations::*;
pub use sink::*;
pub use storage::*;
