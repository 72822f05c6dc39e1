//! Built-in `AnalyzeRule` implementations.

pub mod threshold_within_window;
pub mod time_between_operations;
