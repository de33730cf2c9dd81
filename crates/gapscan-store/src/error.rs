use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the file-backed cache store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("atomic replace of {path} failed: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("post-write verification of {path} failed: {reason}")]
    VerificationFailed { path: PathBuf, reason: String },

    #[error("refusing to commit an empty snapshot collection to {path}")]
    EmptyDocument { path: PathBuf },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the single-instance lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("another instance is running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("io error on lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
