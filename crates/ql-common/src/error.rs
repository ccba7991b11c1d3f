//! Error types for the QuantLab pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("invalid date window: start {start} is after end {end}")]
    InvalidDateWindow { start: String, end: String },

    // Acquisition errors (20-29)
    #[error("transport error: {0}")]
    Transport(String),

    #[error("constituent source error: {0}")]
    Constituents(String),

    // Storage errors (30-39)
    #[error("storage error: {0}")]
    Storage(String),

    #[error("partition lock held by another run: {path}")]
    LockUnavailable { path: PathBuf },

    #[error("domain table not found: {name}")]
    TableNotFound { name: String },

    #[error("failure worklist error: {0}")]
    Worklist(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON log output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::MissingCredential(_) => 11,
            Error::UnknownEndpoint(_) => 12,
            Error::InvalidDateWindow { .. } => 13,
            Error::Transport(_) => 20,
            Error::Constituents(_) => 21,
            Error::Storage(_) => 30,
            Error::LockUnavailable { .. } => 31,
            Error::TableNotFound { .. } => 32,
            Error::Worklist(_) => 33,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Configuration and credential problems abort a run before any work starts.
    pub fn is_fatal_config(&self) -> bool {
        self.code() < 20
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_group_by_category() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(Error::Transport("x".into()).code(), 20);
        assert_eq!(
            Error::LockUnavailable {
                path: PathBuf::from("/tmp/a.lock")
            }
            .code(),
            31
        );
    }

    #[test]
    fn test_fatal_config() {
        assert!(Error::MissingCredential("api key".into()).is_fatal_config());
        assert!(!Error::Storage("disk".into()).is_fatal_config());
    }
}
