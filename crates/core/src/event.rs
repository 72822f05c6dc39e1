//! Event structures for the audit analysis engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EventIdError;

/// One observation emitted by a monitored application.
///
/// Immutable once constructed: rules and analyzers only ever read a
/// `SystemEvent`, they never mutate one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    /// Stable document identifier, decomposable into (partition, row).
    pub id: EventId,

    /// Application that emitted this event.
    pub application_name: String,

    /// Named unit of work within the application (e.g. "charge-card").
    pub operation_name: String,

    /// Outcome of the operation.
    pub outcome: EventOutcome,

    /// Error captured on the operation, if it failed with one.
    pub error: Option<CapturedError>,

    /// Opaque parameters blob, captured verbatim for post-mortem display.
    #[serde(default)]
    pub parameters: serde_json::Value,

    /// UTC timestamp of the observation.
    pub timestamp: DateTime<Utc>,
}

/// Success/failure outcome of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOutcome {
    Success,
    Failure,
}

/// An error captured alongside a failed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedError {
    /// Human-readable error message.
    pub message: String,

    /// Structured trace (stack frames, cause chain, whatever the producer captured).
    #[serde(default)]
    pub trace: serde_json::Value,
}

/// A stable event identifier, decomposable into a (partition, row) pair for
/// archival retrieval by an external document store.
///
/// The encoding is a reversible `partition#row` format; `#` is therefore not
/// permitted inside either component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId {
    partition: String,
    row: String,
}

const EVENT_ID_SEPARATOR: char = '#';

impl EventId {
    /// Build an id from its (partition, row) parts.
    pub fn new(
        partition: impl Into<String>,
        row: impl Into<String>,
    ) -> Result<Self, EventIdError> {
        let partition = partition.into();
        let row = row.into();

        if partition.contains(EVENT_ID_SEPARATOR) || row.contains(EVENT_ID_SEPARATOR) {
            return Err(EventIdError::IllegalSeparator);
        }

        Ok(Self { partition, row })
    }

    /// Generate a fresh id with a random row under the given partition.
    pub fn generate(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            row: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn row(&self) -> &str {
        &self.row
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.partition, EVENT_ID_SEPARATOR, self.row)
    }
}

impl TryFrom<String> for EventId {
    type Error = EventIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut parts = value.splitn(2, EVENT_ID_SEPARATOR);
        let partition = parts.next().ok_or(EventIdError::Malformed)?;
        let row = parts.next().ok_or(EventIdError::Malformed)?;
        Self::new(partition, row)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.to_string()
    }
}

impl SystemEvent {
    /// Create a new event with a freshly generated row id under `application_name`.
    pub fn new(
        application_name: impl Into<String>,
        operation_name: impl Into<String>,
        outcome: EventOutcome,
    ) -> Self {
        let application_name = application_name.into();
        Self {
            id: EventId::generate(&application_name),
            application_name,
            operation_name: operation_name.into(),
            outcome,
            error: None,
            parameters: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Attach a captured error to the event.
    pub fn with_error(mut self, error: CapturedError) -> Self {
        self.error = Some(error);
        self
    }

    /// Attach a parameters blob to the event.
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Override the timestamp (primarily useful for tests and replays).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, EventOutcome::Failure)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, EventOutcome::Success)
    }

    /// The error message, if the event carries a captured error.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}
