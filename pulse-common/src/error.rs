//! Common error types for Pulse

use thiserror::Error;

/// Common result type for Pulse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Pulse workspace
///
/// Only `Config` and `Transport` are ever surfaced to an external listener.
/// Script failures and sample-resolution misses are recovered close to where
/// they happen and never become an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid session configuration; fatal to session start
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport connect/subscribe/stream failure; fatal to the session
    #[error("Transport error: {0}")]
    Transport(String),

    /// Script interpreter could not be initialized (never a script content error)
    #[error("Script engine error: {0}")]
    ScriptLoad(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
