use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use debrepo_core::{RepoConfig, RepoLayout};
use debrepo_sync::{pipeline, SyncError, SyncOptions, Toolchain};

use crate::error::{io_err, DaemonError};
use crate::monitor::{self, ChangeSubscription};
use crate::paths::ROTATION_CHECK_INTERVAL;

/// Start the watch runtime and block the current thread until it exits.
pub fn start_blocking(config: RepoConfig, tools: Toolchain) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(Arc::new(config), Arc::new(tools)))
}

/// Watch the pool and synchronize after each burst of changes until ctrl-c
/// or a failed run.
pub async fn run(config: Arc<RepoConfig>, tools: Arc<Toolchain>) -> Result<(), DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let monitor_handle = {
        let shutdown = shutdown_tx.clone();
        let config = config.clone();
        let tools = tools.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = monitor_task(config, tools, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let log_dir = config.log_dir.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = log_rotation_task(log_dir, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Signal(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (monitor_result, rotation_result, signal_result) =
        tokio::join!(monitor_handle, rotation_handle, signal_handle);

    handle_join("monitor", monitor_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn monitor_task(
    config: Arc<RepoConfig>,
    tools: Arc<Toolchain>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let layout = RepoLayout::from_config(&config);
    layout.check_preconditions().map_err(SyncError::from)?;

    let pool = layout.pool_dir();
    let mut subscription = ChangeSubscription::watch(&pool)?;
    tracing::info!(
        pool = %pool.display(),
        debounce_secs = config.debounce.as_secs(),
        "watching pool for changes"
    );

    let stats = monitor::drive(&mut subscription, config.debounce, shutdown_rx, || {
        run_sync(config.clone(), tools.clone())
    })
    .await?;

    tracing::info!(events = stats.events, runs = stats.runs, "monitor stopped");
    Ok(())
}

/// One pipeline run on the blocking pool; the monitor awaits it, so runs
/// never overlap.
async fn run_sync(config: Arc<RepoConfig>, tools: Arc<Toolchain>) -> Result<(), DaemonError> {
    let report =
        tokio::task::spawn_blocking(move || pipeline::run(&config, &tools, SyncOptions::default()))
            .await
            .map_err(|err| DaemonError::Join {
                task: "sync",
                reason: err.to_string(),
            })??;

    tracing::info!(
        packages = report.package_count(),
        checksummed_files = report.release.checksummed_files,
        duration_ms = report.duration_ms as u64,
        "sync completed"
    );
    Ok(())
}

async fn log_rotation_task(
    log_dir: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(ROTATION_CHECK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let log_dir = log_dir.clone();
                // rotate_logs logs its own failures
                tokio::task::spawn_blocking(move || crate::log_rotation::rotate_logs(&log_dir))
                    .await
                    .ok();
            }
        }
    }
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join {
            task,
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_join_reports_panicked_task() {
        fn boom() -> Result<(), DaemonError> {
            panic!("boom")
        }
        let handle = tokio::spawn(async { boom() });
        let err = handle_join("monitor", handle.await).unwrap_err();
        assert!(err.to_string().starts_with("monitor task join failure"));
    }

    #[tokio::test]
    async fn handle_join_passes_inner_error_through() {
        let handle = tokio::spawn(async { Err(DaemonError::Signal("nope".into())) });
        let err = handle_join("signal_handler", handle.await).unwrap_err();
        assert!(matches!(err, DaemonError::Signal(_)));
    }
}
