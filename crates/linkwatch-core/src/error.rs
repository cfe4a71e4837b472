//! Error types for the connection monitor
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the connection monitor
#[derive(Error, Debug)]
pub enum Error {
    /// An external probe (ping, IP lookup, speed test) failed or timed out.
    /// Never fatal: the observation is treated as down/unknown for this cycle.
    #[error("probe error: {0}")]
    Probe(String),

    /// A persisted file (log, allow-list, watermark) could not be read or
    /// written. Fatal for the failing operation only.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The shipping endpoint rejected an upload or was unreachable.
    /// The watermark is never advanced on this error.
    #[error("shipping error: {0}")]
    Shipping(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a shipping error
    pub fn shipping(msg: impl Into<String>) -> Self {
        Self::Shipping(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
