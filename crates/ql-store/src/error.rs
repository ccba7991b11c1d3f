//! Storage errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error at {path}: {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("CSV error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: arrow::error::ArrowError,
    },

    #[error("partition lock held by another run: {path}")]
    LockHeld { path: PathBuf },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parquet(path: impl Into<PathBuf>, source: parquet::errors::ParquetError) -> Self {
        StoreError::Parquet {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for ql_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockHeld { path } => ql_common::Error::LockUnavailable { path },
            other => ql_common::Error::Storage(other.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
