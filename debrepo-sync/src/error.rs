//! Error types for debrepo-sync.

use std::path::PathBuf;

use thiserror::Error;

use debrepo_core::ConfigError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration or repository precondition failure.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failure while building checksums.
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// An external tool could not be started at all.
    #[error("failed to run `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// An external tool ran and exited non-zero.
    #[error("`{tool}` failed (status {status}): {stderr}")]
    Tool {
        tool: String,
        status: String,
        stderr: String,
    },

    /// Version-control status reported no added/modified/renamed/copied paths.
    #[error("nothing to commit")]
    NothingToCommit,

    /// The local commit exists but the remote did not accept it.
    #[error("push to {remote}/{branch} failed after local commit: {reason}")]
    Push {
        remote: String,
        branch: String,
        reason: String,
    },
}

impl SyncError {
    /// No-op conditions end a run cleanly instead of failing it.
    pub fn is_noop(&self) -> bool {
        matches!(self, SyncError::NothingToCommit)
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
