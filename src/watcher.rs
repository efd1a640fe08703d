//! File system watcher — filtered by the watch set, coalesced, broadcasts reload events.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;

use crate::error::ServeError;
use crate::patterns::{relative_path, IgnoreRules, WatchSet};
use crate::reload::ReloadEvent;

/// Upper bound on how long the watcher thread sleeps before checking the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Longest coalescing window; larger values are clamped.
pub const MAX_WINDOW: Duration = Duration::from_secs(60);

/// Batches changes into one reload per window.
///
/// The first change opens a window of `window` length. Every change recorded
/// before the window closes joins the batch; later changes open a new window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeSet<String>,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.min(MAX_WINDOW),
            pending: BTreeSet::new(),
            deadline: None,
        }
    }

    pub fn record(&mut self, path: String, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now.checked_add(self.window).unwrap_or(now));
        }
        self.pending.insert(path);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the batch if its window has closed.
    pub fn take_ready(&mut self, now: Instant) -> Option<Vec<String>> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        Some(std::mem::take(&mut self.pending).into_iter().collect())
    }
}

/// Everything the watcher thread needs, cloned out of the server config.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Canonical root; `notify` reports canonical paths.
    pub root: PathBuf,
    pub watches: WatchSet,
    pub ignore: IgnoreRules,
    pub debounce: Duration,
    pub full_reload: bool,
}

/// Relative paths in `event` that should trigger a reload.
pub fn changed_paths(
    event: &Event,
    root: &Path,
    watches: &WatchSet,
    ignore: &IgnoreRules,
) -> Vec<String> {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter_map(|p| relative_path(root, p))
        .filter(|rel| !ignore.is_ignored(rel) && watches.matches(rel))
        .collect()
}

/// Handle to the background watcher thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct FileWatcher {
    stop: Arc<AtomicBool>,
}

impl FileWatcher {
    /// Subscribe to the root recursively and spawn the `fs-watcher` thread.
    pub fn spawn(
        options: WatchOptions,
        reload_tx: broadcast::Sender<ReloadEvent>,
    ) -> Result<Self, ServeError> {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(&options.root, RecursiveMode::Recursive)?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        // Dedicated OS thread — never blocks tokio
        std::thread::Builder::new()
            .name("fs-watcher".into())
            .spawn(move || {
                let _watcher = watcher; // prevent drop
                watch_loop(&rx, &options, &reload_tx, &stop_flag);
            })?;

        Ok(Self { stop })
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch_loop(
    rx: &mpsc::Receiver<notify::Result<Event>>,
    options: &WatchOptions,
    reload_tx: &broadcast::Sender<ReloadEvent>,
    stop: &AtomicBool,
) {
    let mut debouncer = Debouncer::new(options.debounce);

    while !stop.load(Ordering::Relaxed) {
        let timeout = debouncer.next_deadline().map_or(POLL_INTERVAL, |deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .min(POLL_INTERVAL)
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                let now = Instant::now();
                for rel in changed_paths(&event, &options.root, &options.watches, &options.ignore) {
                    tracing::debug!(path = %rel, kind = ?event.kind, "Recorded change");
                    debouncer.record(rel, now);
                }
            }
            // Runtime watch errors never stop serving
            Ok(Err(e)) => tracing::warn!(error = %e, "File watch error"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(paths) = debouncer.take_ready(Instant::now()) {
            let event = ReloadEvent::for_changes(paths, options.full_reload);
            let clients = reload_tx.send(event.clone()).unwrap_or(0);
            tracing::info!(paths = ?event.paths(), clients, "↻ Reload");
        }
    }

    tracing::debug!("File watcher stopped");
}
