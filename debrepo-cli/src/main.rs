//! debrepo: keep a self-hosted Debian repository indexed, signed, and
//! published.
//!
//! # Usage
//!
//! ```text
//! debrepo sync [--config <path>] [--json] [--no-publish]
//! debrepo watch [--config <path>]
//! debrepo status [--config <path>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{status::StatusArgs, sync::SyncArgs, watch::WatchArgs};

#[derive(Parser, Debug)]
#[command(
    name = "debrepo",
    version,
    about = "Index, sign, and publish a Debian package repository",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Regenerate indexes and the signed Release, then commit and push.
    Sync(SyncArgs),

    /// Watch the pool and sync after each burst of changes.
    Watch(WatchArgs),

    /// Show the commit message the next publication would use.
    Status(StatusArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Watch(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}
