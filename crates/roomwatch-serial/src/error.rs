//! Serial transport error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("Connection failed: {path}: {reason}")]
    Connection { path: String, reason: String },

    #[error("Connect already in progress")]
    AlreadyConnecting,

    #[error("Connect aborted by close")]
    Aborted,

    #[error("Decode error: {reason}")]
    Decode { line: String, reason: String },

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SerialError {
    pub(crate) fn connection(path: &str, reason: impl ToString) -> Self {
        Self::Connection {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type SerialResult<T> = Result<T, SerialError>;
