//! Error types for DelaySend.

use thiserror::Error;

/// Errors surfaced by the fallible edges of the service (config, snapshot
/// loading, transports, command parsing). The controller itself never
/// returns these; it logs and cleans up.
#[derive(Debug, Error)]
pub enum DelaySendError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid command: {0}")]
    Command(String),
}

pub type Result<T> = std::result::Result<T, DelaySendError>;
