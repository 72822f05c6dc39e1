//! Errors specific to the alarm sink implementations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlarmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    WebhookRejected { status: u16, body: String },
}
