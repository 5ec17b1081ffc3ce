//! Repository tree layout.
//!
//! # Storage layout
//!
//! ```text
//! <repo_root>/
//!   pool/                                   (package files, flat or bucketed)
//!   dists/<suite>/
//!     Release, Release.gpg, InRelease
//!     <component>/binary-<arch>/
//!       Packages, Packages.gz, Packages.xz
//! ```
//!
//! All helpers are pure: they only join paths and never touch the disk,
//! except [`RepoLayout::check_preconditions`].

use std::path::{Path, PathBuf};

use crate::config::RepoConfig;
use crate::error::ConfigError;

pub const POOL_DIR: &str = "pool";
pub const DISTS_DIR: &str = "dists";
pub const PACKAGES_FILE: &str = "Packages";
pub const RELEASE_FILE: &str = "Release";
pub const DETACHED_SIGNATURE_FILE: &str = "Release.gpg";
pub const INLINE_SIGNED_FILE: &str = "InRelease";

/// Suffix for in-flight writes; files carrying it are never checksummed.
pub const TMP_SUFFIX: &str = "debrepo.tmp";

/// Paths into one suite of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    root: PathBuf,
    suite: String,
    component: String,
}

impl RepoLayout {
    pub fn new(root: impl Into<PathBuf>, suite: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suite: suite.into(),
            component: component.into(),
        }
    }

    pub fn from_config(config: &RepoConfig) -> Self {
        Self::new(&config.repo_root, &config.suite, &config.component)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// `<root>/pool`
    pub fn pool_dir(&self) -> PathBuf {
        self.root.join(POOL_DIR)
    }

    /// `<root>/dists/<suite>`, the metadata tree covered by the Release file.
    pub fn suite_dir(&self) -> PathBuf {
        self.root.join(DISTS_DIR).join(&self.suite)
    }

    /// `<root>/dists/<suite>/<component>/binary-<arch>`
    pub fn binary_dir(&self, arch: &str) -> PathBuf {
        self.suite_dir()
            .join(&self.component)
            .join(format!("binary-{arch}"))
    }

    /// `<root>/dists/<suite>/<component>/binary-<arch>/Packages`
    pub fn packages_path(&self, arch: &str) -> PathBuf {
        self.binary_dir(arch).join(PACKAGES_FILE)
    }

    pub fn release_path(&self) -> PathBuf {
        self.suite_dir().join(RELEASE_FILE)
    }

    pub fn detached_signature_path(&self) -> PathBuf {
        self.suite_dir().join(DETACHED_SIGNATURE_FILE)
    }

    pub fn inline_signed_path(&self) -> PathBuf {
        self.suite_dir().join(INLINE_SIGNED_FILE)
    }

    /// Verify `pool/` and `dists/<suite>/` exist before anything is written.
    pub fn check_preconditions(&self) -> Result<(), ConfigError> {
        if !self.root.is_dir() {
            return Err(ConfigError::MissingDirectory {
                what: "repository root",
                path: self.root.clone(),
            });
        }
        let pool = self.pool_dir();
        if !pool.is_dir() {
            return Err(ConfigError::MissingDirectory {
                what: "pool directory",
                path: pool,
            });
        }
        let suite = self.suite_dir();
        if !suite.is_dir() {
            return Err(ConfigError::MissingDirectory {
                what: "suite metadata directory",
                path: suite,
            });
        }
        Ok(())
    }
}

/// Temp sibling used for atomic `write + rename` of `path`.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.{TMP_SUFFIX}", path.display()))
}

/// True for the Release descriptor, its signatures, and in-flight temp files.
pub fn is_release_artifact(file_name: &str) -> bool {
    matches!(
        file_name,
        RELEASE_FILE | DETACHED_SIGNATURE_FILE | INLINE_SIGNED_FILE
    ) || file_name.ends_with(TMP_SUFFIX)
}
