//! Errors raised by the analysis engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine is not running")]
    EngineNotRunning,

    #[error("rule '{rule}' belongs to program '{expected}', not '{actual}'")]
    ProgramMismatch {
        rule: String,
        expected: String,
        actual: String,
    },

    #[error("rule evaluation fault: {0}")]
    RuleEvaluationFault(String),

    #[error("analyzer fault in '{program}': {reason}")]
    AnalyzerFault { program: String, reason: String },

    #[error("engine fault: {0}")]
    EngineFault(String),

    #[error("shutdown did not complete within the grace period")]
    ShutdownTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
