//! Common error types for pairank

use thiserror::Error;

/// Common result type for pairank operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the engine and the rating server
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Experiment definition is malformed or inconsistent (fatal at startup)
    #[error("Invalid experiment definition: {0}")]
    Definition(String),

    /// Progress snapshot could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request does not match current state (e.g. stale submission)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
