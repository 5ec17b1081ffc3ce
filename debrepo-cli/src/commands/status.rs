//! `debrepo status`: preview the next publication.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use debrepo_sync::commit::preview_message;
use debrepo_sync::tools::GitCli;

use super::ConfigArg;

/// Arguments for `debrepo status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let message = preview_message(&config.repo_root, &GitCli)
            .with_context(|| format!("failed to read status of {}", config.repo_root.display()))?;

        match message {
            Some(message) => println!("{} {message}", "next commit:".bold()),
            None => println!("{}", "nothing to commit".dimmed()),
        }
        Ok(())
    }
}
