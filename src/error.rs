//! Error types for chunkback
//!
//! Task-level faults are collected by the transfer engine and re-raised once,
//! so callers see a single error per backup or restore.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for backup and restore operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// I/O error outside of the transfer tasks
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O fault inside one transfer task
    #[error("transfer task {index} failed at offset {offset} (+{length} bytes): {source}")]
    Task {
        index: usize,
        offset: u64,
        length: u64,
        #[source]
        source: std::io::Error,
    },

    /// One or more transfer tasks failed; carries the first observed failure
    #[error("{failed} transfer task(s) failed: {source}")]
    TransferFailed {
        failed: usize,
        #[source]
        source: Box<BackupError>,
    },

    /// The bounded wait elapsed before every task reported
    #[error("transfer incomplete: {outstanding} task(s) unconfirmed after {timeout_secs} seconds")]
    Incomplete { outstanding: usize, timeout_secs: u64 },

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl BackupError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// True when the transfer timed out without a hard failure
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::TransferFailed { source, .. } => source.path(),
            _ => None,
        }
    }
}

/// Result type alias for chunkback operations
pub type Result<T> = std::result::Result<T, BackupError>;

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        BackupError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        BackupError::ConfigError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| BackupError::io(path, e))
    }
}
