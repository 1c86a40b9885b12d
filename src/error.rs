//! Crate error types

use thiserror::Error;

/// Error type for artifact and poller operations
#[derive(Error, Debug)]
pub enum Error {
    /// A notification channel whose receiver is already gone was registered
    #[error("notify channel is closed")]
    ClosedChannel,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Artifact update error
    #[error("Artifact error: {0}")]
    Artifact(String),
}

/// Result type alias for artifact and poller operations
pub type Result<T> = std::result::Result<T, Error>;
