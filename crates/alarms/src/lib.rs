//! # Audit Watch Alarms
//!
//! Concrete [`auditwatch_engine::sink::AlarmSink`] implementations: a
//! logging sink, an in-process broadcast sink, a webhook sink, and a
//! fan-out composing any number of the above.

pub mod error;
pub mod sinks;

pub use error::*;
pub use sinks::broadcast::BroadcastAlarmSink;
pub use sinks::fan_out::FanOutAlarmSink;
pub use sinks::logging::LoggingAlarmSink;
pub use sinks::webhook::WebhookAlarmSink;
