//! Change monitor for the package pool.
//!
//! A [`ChangeSubscription`] turns filesystem notifications under `pool/` into
//! a stream of [`ChangeEvent`]s. [`drive`] consumes that stream on a single
//! task and owns the debounce timer:
//!
//! ```text
//! Watching --event--> Debouncing{deadline} --deadline--> Synchronizing --ok--> Watching
//! ```
//!
//! The deadline is fixed by the first event of a burst; later events in the
//! same window neither move it nor schedule a second run. Events that arrive
//! while a run is in progress stay queued in the channel and open the next
//! window once the run finishes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};

use debrepo_core::ChangeKind;

use crate::error::DaemonError;

/// One relevant change below the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Map a notify event kind onto the changes that warrant a sync.
///
/// Access and metadata-only events are ignored.
pub fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Remove(_) => Some(ChangeKind::Delete),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Move),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Modify),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Cancellable stream of pool changes.
pub struct ChangeSubscription {
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    watcher: Option<RecommendedWatcher>,
}

impl ChangeSubscription {
    /// Start a recursive watch on `dir`.
    pub fn watch(dir: &Path) -> Result<Self, DaemonError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                let Some(kind) = classify(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    let _ = tx.send(ChangeEvent { path, kind });
                }
            }
            Err(err) => tracing::warn!(error = %err, "watcher event error"),
        })?;
        watcher.watch(dir, RecursiveMode::Recursive)?;
        Ok(Self {
            rx,
            watcher: Some(watcher),
        })
    }

    /// A subscription fed by an existing channel instead of the filesystem.
    pub fn from_receiver(rx: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self { rx, watcher: None }
    }

    /// Next change, or `None` once the subscription is cancelled and drained.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Stop the underlying watcher. Already queued events can still be read.
    pub fn cancel(&mut self) {
        self.watcher = None;
        self.rx.close();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Watching,
    Debouncing { deadline: Instant },
    Synchronizing,
}

/// Fixed-window debounce timer.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Record an event seen at `now`. Returns true when it opened a new
    /// window; an open window keeps its original deadline.
    pub fn observe(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.window);
        true
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }
}

/// Counters reported when the monitor stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub events: usize,
    pub runs: usize,
}

/// Consume `subscription` until shutdown, calling `trigger` once per
/// debounce window.
///
/// A failing trigger ends the monitor with that error. Shutdown is honoured
/// between runs; a run already in progress completes first.
pub async fn drive<F, Fut>(
    subscription: &mut ChangeSubscription,
    window: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
    mut trigger: F,
) -> Result<MonitorStats, DaemonError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), DaemonError>>,
{
    let mut stats = MonitorStats::default();
    let mut debouncer = Debouncer::new(window);
    let mut state = MonitorState::Idle;
    transition(&mut state, MonitorState::Watching);

    let result = loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            _ = shutdown_rx.recv() => break Ok(stats),
            event = subscription.next() => {
                let Some(event) = event else { break Ok(stats) };
                stats.events += 1;
                tracing::debug!(path = %event.path.display(), kind = ?event.kind, "pool change");
                if debouncer.observe(Instant::now()) {
                    if let Some(deadline) = debouncer.deadline() {
                        transition(&mut state, MonitorState::Debouncing { deadline });
                    }
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                debouncer.clear();
                transition(&mut state, MonitorState::Synchronizing);
                if let Err(err) = trigger().await {
                    tracing::error!(error = %err, "synchronization failed, stopping monitor");
                    break Err(err);
                }
                stats.runs += 1;
                transition(&mut state, MonitorState::Watching);
            }
        }
    };

    subscription.cancel();
    transition(&mut state, MonitorState::Idle);
    result
}

fn transition(state: &mut MonitorState, next: MonitorState) {
    tracing::debug!(from = ?*state, to = ?next, "monitor state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use notify::event::{CreateKind, MetadataKind, RemoveKind, RenameMode};
    use tokio::time::advance;

    const WINDOW: Duration = Duration::from_secs(5);

    fn event(name: &str) -> ChangeEvent {
        ChangeEvent {
            path: PathBuf::from("/srv/repo/pool").join(name),
            kind: ChangeKind::Create,
        }
    }

    struct Harness {
        tx: mpsc::UnboundedSender<ChangeEvent>,
        shutdown_tx: broadcast::Sender<()>,
        runs: Arc<AtomicUsize>,
        handle: tokio::task::JoinHandle<Result<MonitorStats, DaemonError>>,
    }

    fn spawn_monitor(fail: bool) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = tokio::spawn(async move {
            let mut subscription = ChangeSubscription::from_receiver(rx);
            drive(&mut subscription, WINDOW, shutdown_rx, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if fail {
                        Err(DaemonError::Signal("sync exploded".into()))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
        });
        Harness {
            tx,
            shutdown_tx,
            runs,
            handle,
        }
    }

    #[test]
    fn classify_keeps_content_and_name_changes() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Create)
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File)),
            Some(ChangeKind::Delete)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(ChangeKind::Move)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Any)),
            Some(ChangeKind::Modify)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))),
            None
        );
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn debouncer_keeps_first_deadline() {
        let mut debouncer = Debouncer::new(WINDOW);
        let start = Instant::now();
        assert!(debouncer.observe(start));
        advance(Duration::from_secs(3)).await;
        assert!(!debouncer.observe(Instant::now()));
        assert_eq!(debouncer.deadline(), Some(start + WINDOW));
        debouncer.clear();
        assert_eq!(debouncer.deadline(), None);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn burst_of_events_triggers_one_run() {
        let harness = spawn_monitor(false);

        for n in 0..5 {
            harness.tx.send(event(&format!("pkg{n}.deb"))).unwrap();
            advance(Duration::from_millis(500)).await;
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(harness.runs.load(Ordering::SeqCst), 1);

        harness.shutdown_tx.send(()).unwrap();
        let stats = harness.handle.await.unwrap().unwrap();
        assert_eq!(stats, MonitorStats { events: 5, runs: 1 });
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn separate_bursts_trigger_separate_runs() {
        let harness = spawn_monitor(false);

        harness.tx.send(event("a.deb")).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        harness.tx.send(event("b.deb")).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(harness.runs.load(Ordering::SeqCst), 2);
        harness.shutdown_tx.send(()).unwrap();
        harness.handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn late_event_in_window_does_not_extend_deadline() {
        let harness = spawn_monitor(false);

        harness.tx.send(event("a.deb")).unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        harness.tx.send(event("b.deb")).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(
            harness.runs.load(Ordering::SeqCst),
            1,
            "run fires five seconds after the first event"
        );
        harness.shutdown_tx.send(()).unwrap();
        harness.handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn failed_run_stops_the_monitor() {
        let harness = spawn_monitor(true);

        harness.tx.send(event("broken.deb")).unwrap();
        let result = harness.handle.await.unwrap();

        assert!(matches!(result, Err(DaemonError::Signal(_))));
        assert_eq!(harness.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn shutdown_while_idle_runs_nothing() {
        let harness = spawn_monitor(false);
        harness.shutdown_tx.send(()).unwrap();
        let stats = harness.handle.await.unwrap().unwrap();
        assert_eq!(stats, MonitorStats::default());
        drop(harness.tx);
    }
}
