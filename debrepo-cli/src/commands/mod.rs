pub mod status;
pub mod sync;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use debrepo_core::{config, RepoConfig};
use debrepo_sync::tools::probe_host_defaults;

/// `--config` shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArg {
    /// Configuration file (default: $DEBREPO_CONFIG, then /etc/debrepo/config.yaml).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ConfigArg {
    /// Read the YAML file and resolve it against host defaults.
    pub fn load(&self) -> Result<RepoConfig> {
        let path = config::config_path(self.config.as_deref());
        let raw = config::load_at(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        let host = probe_host_defaults(raw.repo_root.as_deref());
        raw.resolve(&host)
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }
}

/// Load configuration and install logging.
pub fn bootstrap(config: &ConfigArg) -> Result<RepoConfig> {
    let config = config.load()?;
    debrepo_daemon::logging::init(&config.log_dir, config.log_json).with_context(|| {
        format!(
            "failed to set up logging in {}",
            config.log_dir.display()
        )
    })?;
    Ok(config)
}
