//! Repository configuration.
//!
//! The YAML file is deserialised into [`RawConfig`] (every field optional),
//! then [`RawConfig::resolve`] fills defaults and checks required values,
//! producing the immutable [`RepoConfig`] every component receives by
//! reference.
//!
//! ```yaml
//! repo_root: /srv/apt
//! signing_key: packages@example.org
//! suite: stable
//! architectures: [amd64, arm64]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::HashAlgorithm;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/debrepo/config.yaml";
pub const CONFIG_ENV_VAR: &str = "DEBREPO_CONFIG";
pub const DEFAULT_SUITE: &str = "stable";
pub const DEFAULT_COMPONENT: &str = "main";
pub const DEFAULT_ORIGIN: &str = "debrepo";
pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_DEBOUNCE_SECS: u64 = 5;
pub const DEFAULT_PACKAGE_NAME: &str = "debrepo";
pub const DEFAULT_SERVICE_NAME: &str = "debrepo.service";
pub const DEFAULT_DPKG_LOG: &str = "/var/log/dpkg.log";

/// On-disk configuration as written by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub repo_root: Option<PathBuf>,
    pub suite: Option<String>,
    pub codename: Option<String>,
    pub origin: Option<String>,
    pub label: Option<String>,
    pub version: Option<String>,
    pub architectures: Option<Vec<String>>,
    pub component: Option<String>,
    pub description: Option<String>,
    pub maintainer: Option<String>,
    pub signing_key: Option<String>,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub hash_algorithms: Option<Vec<HashAlgorithm>>,
    pub debounce_secs: Option<u64>,
    pub package_name: Option<String>,
    pub service_name: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_json: Option<bool>,
    pub dpkg_log: Option<PathBuf>,
}

/// Values discovered from the host, used when the config leaves them unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostDefaults {
    /// Native Debian architecture (`dpkg --print-architecture`).
    pub architecture: Option<String>,
    /// `Name <email>` from the version-control identity.
    pub maintainer: Option<String>,
}

/// Fully resolved, immutable configuration for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoConfig {
    pub repo_root: PathBuf,
    pub suite: String,
    pub codename: String,
    pub origin: String,
    pub label: String,
    pub version: String,
    pub architectures: Vec<String>,
    pub component: String,
    pub description: String,
    pub maintainer: String,
    pub signing_key: String,
    pub remote: String,
    pub branch: String,
    pub hash_algorithms: Vec<HashAlgorithm>,
    pub debounce: Duration,
    pub package_name: String,
    pub service_name: String,
    pub log_dir: PathBuf,
    pub log_json: bool,
    pub dpkg_log: PathBuf,
}

impl RawConfig {
    /// Fill defaults and validate. Fails before anything touches the repository.
    pub fn resolve(self, host: &HostDefaults) -> Result<RepoConfig, ConfigError> {
        let repo_root = self
            .repo_root
            .ok_or(ConfigError::MissingField { field: "repo_root" })?;
        let signing_key = non_empty("signing_key", self.signing_key)?
            .ok_or(ConfigError::MissingField { field: "signing_key" })?;

        let suite = non_empty("suite", self.suite)?.unwrap_or_else(|| DEFAULT_SUITE.to_string());
        let codename = non_empty("codename", self.codename)?.unwrap_or_else(|| suite.clone());
        let origin = non_empty("origin", self.origin)?.unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let label = non_empty("label", self.label)?.unwrap_or_else(|| origin.clone());
        let description = non_empty("description", self.description)?
            .unwrap_or_else(|| format!("{origin} {suite} repository"));

        let architectures = match self.architectures {
            Some(archs) if archs.is_empty() => {
                return Err(ConfigError::Invalid {
                    field: "architectures",
                    reason: "at least one architecture is required".to_string(),
                })
            }
            Some(archs) => archs,
            None => vec![host
                .architecture
                .clone()
                .unwrap_or_else(|| native_architecture().to_string())],
        };

        let maintainer = match non_empty("maintainer", self.maintainer)? {
            Some(m) => m,
            None => host
                .maintainer
                .clone()
                .ok_or(ConfigError::MissingField { field: "maintainer" })?,
        };

        let mut hash_algorithms = self.hash_algorithms.unwrap_or_else(HashAlgorithm::defaults);
        hash_algorithms.sort();
        hash_algorithms.dedup();
        if hash_algorithms.is_empty() {
            return Err(ConfigError::Invalid {
                field: "hash_algorithms",
                reason: "at least one algorithm is required".to_string(),
            });
        }

        let debounce_secs = self.debounce_secs.unwrap_or(DEFAULT_DEBOUNCE_SECS);
        if debounce_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "debounce_secs",
                reason: "debounce window must be at least one second".to_string(),
            });
        }

        Ok(RepoConfig {
            repo_root,
            suite,
            codename,
            label,
            origin,
            version: non_empty("version", self.version)?
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            architectures,
            component: non_empty("component", self.component)?
                .unwrap_or_else(|| DEFAULT_COMPONENT.to_string()),
            description,
            maintainer,
            signing_key,
            remote: non_empty("remote", self.remote)?.unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
            branch: non_empty("branch", self.branch)?.unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            hash_algorithms,
            debounce: Duration::from_secs(debounce_secs),
            package_name: non_empty("package_name", self.package_name)?
                .unwrap_or_else(|| DEFAULT_PACKAGE_NAME.to_string()),
            service_name: non_empty("service_name", self.service_name)?
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            log_dir: self.log_dir.unwrap_or_else(default_log_dir),
            log_json: self.log_json.unwrap_or(false),
            dpkg_log: self
                .dpkg_log
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DPKG_LOG)),
        })
    }
}

/// Pick the config file: explicit flag, then `$DEBREPO_CONFIG`, then `/etc`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

/// Read and parse the YAML config at `path`.
pub fn load_at(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Debian name of the architecture this binary was built for.
pub fn native_architecture() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "i386",
        "aarch64" => "arm64",
        "arm" => "armhf",
        "powerpc64" => "ppc64el",
        "s390x" => "s390x",
        "riscv64" => "riscv64",
        other => other,
    }
}

/// `<state_dir>/debrepo`, or `~/.debrepo/logs` where no state dir exists.
fn default_log_dir() -> PathBuf {
    if let Some(state) = dirs::state_dir() {
        return state.join("debrepo");
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".debrepo")
        .join("logs")
}

fn non_empty(field: &'static str, value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ConfigError::Invalid {
            field,
            reason: "value must not be empty".to_string(),
        }),
        other => Ok(other),
    }
}
