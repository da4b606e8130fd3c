//! Crate-level error type.

use thiserror::Error;

/// Errors surfaced by channel provisioning and config handling.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// The channel spec failed validation. Nothing was mutated.
    #[error("invalid channel spec: {0}")]
    InvalidSpec(String),

    /// A config payload could not be decoded as a string-to-string map.
    #[error("failed to decode config payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A config handler rejected the decoded update.
    #[error("config handler failed: {0}")]
    Handler(String),
}
