//! `debrepo sync`: one full pipeline run.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use debrepo_sync::{pipeline, PublishOutcome, SyncOptions, SyncReport, Toolchain};

use super::{bootstrap, ConfigArg};

/// Arguments for `debrepo sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Regenerate indexes and the Release only; skip commit and push.
    #[arg(long)]
    pub no_publish: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let config = bootstrap(&self.config)?;
        let options = SyncOptions {
            publish: !self.no_publish,
        };

        let report = match pipeline::run(&config, &Toolchain::system(), options) {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(error = %err, "sync failed");
                return Err(err).with_context(|| {
                    format!("sync failed for {}", config.repo_root.display())
                });
            }
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to encode report")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "{} {} package(s) indexed, {} file(s) checksummed ({} ms)",
        "✓".green(),
        report.package_count(),
        report.release.checksummed_files,
        report.duration_ms
    );
    for index in &report.indexes {
        println!(
            "  {}  {} ({} package(s))",
            index.arch.bold(),
            index.packages_path.display(),
            index.package_count
        );
    }
    println!("  signed  {}", report.release.release.display());

    match &report.publication {
        Some(PublishOutcome::Committed { message }) => {
            println!("  {} {}", "published:".green(), message)
        }
        Some(PublishOutcome::Pushed { pending }) => println!(
            "  {} {pending} pending commit(s)",
            "pushed:".green()
        ),
        Some(PublishOutcome::NothingToCommit) => {
            println!("  {}", "nothing to commit".dimmed())
        }
        None => println!("  {}", "publication skipped".yellow()),
    }
    if report.restarted_service {
        println!("  {}", "service restarted after self-upgrade".yellow());
    }
}
