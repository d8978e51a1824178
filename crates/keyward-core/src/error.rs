//! Error types for Keyward

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Startup Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Store Errors
    #[error("Corrupt record file {path:?}: {reason}")]
    RecordCorrupt { path: PathBuf, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage backend error: {0}")]
    Storage(String),

    // Internal Errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::RecordCorrupt { .. } => "RecordCorrupt",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::Storage(_) => "StorageError",
            Error::Internal(_) | Error::Io(_) | Error::Other(_) => "InternalError",
        }
    }

    /// Fatal errors halt initialisation or the current scan and must be
    /// fixed by an operator; everything else is a per-request failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::RecordCorrupt { .. })
    }

    pub fn record_corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::RecordCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
