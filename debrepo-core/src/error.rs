//! Error types for debrepo-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load; serde_yaml supplies line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// A value with no default was left unset.
    #[error("missing required config value `{field}`")]
    MissingField { field: &'static str },

    /// A value was present but unusable.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// A repository directory required before any mutation is absent.
    #[error("repository precondition failed: {what} not found at {path}")]
    MissingDirectory { what: &'static str, path: PathBuf },
}
