//! Error types for roomwatch-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Reading is not a JSON object: {0}")]
    NotAnObject(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
