//! Shared sync pipeline entrypoint used by CLI and daemon.
//!
//! index -> release + sign -> publish, strictly in order, every step handed
//! the repository root explicitly. After a successful run the self-upgrade
//! check may restart the background service.

use std::time::Instant;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;

use debrepo_core::{RepoConfig, RepoLayout};

use crate::commit::{self, PublishOutcome};
use crate::error::SyncError;
use crate::index::{self, IndexOutcome};
use crate::release::{self, ReleaseArtifacts};
use crate::tools::Toolchain;
use crate::upgrade;

/// Knobs for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Commit and push after signing.
    pub publish: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { publish: true }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub indexes: Vec<IndexOutcome>,
    pub release: ReleaseArtifacts,
    /// `None` when publication was skipped.
    pub publication: Option<PublishOutcome>,
    pub restarted_service: bool,
    pub duration_ms: u128,
}

impl SyncReport {
    pub fn package_count(&self) -> usize {
        self.indexes.iter().map(|i| i.package_count).sum()
    }
}

/// Run the sync pipeline against the configured repository.
///
/// This is the canonical sync entrypoint for both `debrepo sync` and the
/// watch-mode monitor.
pub fn run(
    config: &RepoConfig,
    tools: &Toolchain,
    options: SyncOptions,
) -> Result<SyncReport, SyncError> {
    run_at(config, tools, options, Utc::now(), Local::now().date_naive())
}

/// [`run`] with an explicit clock; `today` is the local date compared
/// against the dpkg log.
pub fn run_at(
    config: &RepoConfig,
    tools: &Toolchain,
    options: SyncOptions,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Result<SyncReport, SyncError> {
    let started = Instant::now();
    let layout = RepoLayout::from_config(config);
    layout.check_preconditions()?;
    tracing::info!(
        "sync started: {} (suite {})",
        layout.root().display(),
        layout.suite()
    );

    let indexes = index::build_all(
        &layout,
        &config.architectures,
        tools.indexer.as_ref(),
        tools.compressor.as_ref(),
    )?;

    let release = release::generate(&layout, config, tools.signer.as_ref(), now)?;

    let publication = if options.publish {
        match commit::publish(config, tools.vcs.as_ref()) {
            Ok(outcome) => Some(outcome),
            Err(err) if err.is_noop() => Some(PublishOutcome::NothingToCommit),
            Err(err) => return Err(err),
        }
    } else {
        tracing::info!("publication skipped");
        None
    };

    let restarted_service = restart_if_upgraded(config, tools, today);

    let report = SyncReport {
        indexes,
        release,
        publication,
        restarted_service,
        duration_ms: started.elapsed().as_millis(),
    };
    tracing::info!(
        "sync finished: {} package(s), {} checksummed file(s) in {} ms",
        report.package_count(),
        report.release.checksummed_files,
        report.duration_ms
    );
    Ok(report)
}

/// Restart the service when our own package was upgraded today.
///
/// Failures are logged and never fail the run that already succeeded.
fn restart_if_upgraded(config: &RepoConfig, tools: &Toolchain, today: NaiveDate) -> bool {
    match upgrade::upgraded_on(&config.dpkg_log, &config.package_name, today) {
        Ok(true) => {}
        Ok(false) => return false,
        Err(err) => {
            tracing::warn!("self-upgrade check failed: {err}");
            return false;
        }
    }

    tracing::info!(
        "{} was upgraded today; restarting {}",
        config.package_name,
        config.service_name
    );
    match tools.services.restart(&config.service_name) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("restart of {} failed: {err}", config.service_name);
            false
        }
    }
}
