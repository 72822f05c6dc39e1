//! Error types shared by the core data model.

use thiserror::Error;

/// Errors that can occur while constructing or parsing an [`crate::EventId`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventIdError {
    /// Partition or row contained the `#` separator.
    #[error("event id components must not contain '#'")]
    IllegalSeparator,

    /// The encoded string did not contain a separator at all.
    #[error("malformed event id: missing '#' separator")]
    Malformed,
}
