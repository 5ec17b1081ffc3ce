//! Configuration, repository layout, and domain types shared by debrepo.
//!
//! - [`config`]: [`RawConfig`] / [`RepoConfig`] and YAML loading
//! - [`layout`]: [`RepoLayout`] path helpers
//! - [`types`]: hash algorithms, status codes, change kinds
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod layout;
pub mod types;

pub use config::{HostDefaults, RawConfig, RepoConfig};
pub use error::ConfigError;
pub use layout::RepoLayout;
pub use types::{ChangeKind, HashAlgorithm, StatusCode};
