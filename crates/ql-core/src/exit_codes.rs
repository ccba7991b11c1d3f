//! Exit codes for the `quantlab` CLI.
//!
//! Stable so that schedulers can branch on them without parsing output.

use ql_common::Error;

/// Exit codes for quantlab commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command completed with nothing left to attend to
    Clean = 0,

    /// Command completed but some units or records failed
    PartialFail = 1,

    /// Configuration error (file, validation, endpoint names, date window)
    ConfigError = 10,

    /// Provider credential missing
    CredentialError = 11,

    /// Transport or constituent source error
    AcquisitionError = 20,

    /// Storage error (Parquet, Arrow, CSV)
    StorageError = 30,

    /// Another run holds the partition lock
    LockHeld = 31,

    /// Requested domain table does not exist
    NotFound = 32,

    /// Worklist missing or malformed
    WorklistError = 33,

    /// I/O error
    IoError = 60,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::UnknownEndpoint(_) | Error::InvalidDateWindow { .. } => {
                ExitCode::ConfigError
            }
            Error::MissingCredential(_) => ExitCode::CredentialError,
            Error::Transport(_) | Error::Constituents(_) => ExitCode::AcquisitionError,
            Error::Storage(_) => ExitCode::StorageError,
            Error::LockUnavailable { .. } => ExitCode::LockHeld,
            Error::TableNotFound { .. } => ExitCode::NotFound,
            Error::Worklist(_) => ExitCode::WorklistError,
            Error::Io(_) => ExitCode::IoError,
            Error::Json(_) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
