use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the change monitor, runtime, and logging setup.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("sync error: {0}")]
    Sync(#[from] debrepo_sync::SyncError),

    #[error("{task} task join failure: {reason}")]
    Join { task: &'static str, reason: String },

    #[error("signal handler failed: {0}")]
    Signal(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
