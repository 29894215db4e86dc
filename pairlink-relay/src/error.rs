//! Error types for pairlink-relay.

use std::path::PathBuf;

/// Main error type for relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Durable store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error (listener bind or accept failure).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registered-nickname store errors.
///
/// These are always non-fatal to the running server: the in-memory set
/// stays authoritative and failures are only logged.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the registry file failed.
    #[error("failed to access registry file {path}: {source}")]
    Io {
        /// Path of the file involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The registry file does not hold a JSON list of strings.
    #[error("registry file {path} is not a valid nickname list: {source}")]
    Corrupt {
        /// Path of the corrupt file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Protocol-level failures on a single connection.
///
/// Never terminal: the offending record is discarded and the connection
/// keeps processing subsequent records.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The record could not be decoded.
    #[error(transparent)]
    Wire(#[from] pairlink_types::WireError),

    /// A line exceeded the configured maximum length.
    #[error("line exceeds the configured maximum length")]
    LineTooLong,
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
