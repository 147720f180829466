//! Error types and handling.

use thiserror::Error;

/// Errors raised while framing or parsing ZK wire-protocol packets (C1).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Checksum verification failed on a received frame.
    #[error("bad checksum")]
    BadChecksum,

    /// Response command/session/reply did not match what was expected.
    #[error("unexpected command: {0}")]
    UnexpectedCommand(String),

    /// Frame was shorter than the minimum valid size.
    #[error("truncated frame: {0}")]
    Truncated(String),
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// TCP connection to a device timed out.
    #[error("Connect timeout: {0}")]
    ConnectTimeout(String),

    /// TCP connection to a device was refused or reset.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A single command round-trip exceeded its deadline.
    #[error("Command timeout: {0}")]
    CommandTimeout(String),

    /// Wire-protocol framing/checksum error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session used after it was closed or before it was connected.
    #[error("Not connected")]
    NotConnected,

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store (de)serialization error
    #[error("Store error: {0}")]
    Store(#[from] serde_json::Error),

    /// Store file was unparseable at startup and has been backed up.
    #[error("Store corrupt, backed up to {0}")]
    StoreCorrupt(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create a config error with message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error with message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error with message
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
