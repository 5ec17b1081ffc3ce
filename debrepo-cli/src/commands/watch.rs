//! `debrepo watch`: long-running pool monitor.

use anyhow::{Context, Result};
use clap::Args;

use debrepo_sync::Toolchain;

use super::{bootstrap, ConfigArg};

/// Arguments for `debrepo watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let config = bootstrap(&self.config)?;
        let pool = config.repo_root.join(debrepo_core::layout::POOL_DIR);
        debrepo_daemon::start_blocking(config, Toolchain::system())
            .with_context(|| format!("watch stopped for {}", pool.display()))
    }
}
