//! Debounced catalog refresh driven by filesystem events

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{AudioIndex, refresh};
use crate::Result;

/// Resettable delay: `arm` (re)starts the quiet period, `fired` resolves once it elapses
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    /// Create a disarmed debouncer with the given quiet period
    #[must_use]
    pub const fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    /// Arm the timer, pushing the deadline out if already armed
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.quiet);
    }

    /// Disarm without firing
    pub const fn reset(&mut self) {
        self.deadline = None;
    }

    /// Whether a fire is pending
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the pending deadline and disarm
    ///
    /// Never resolves while disarmed. Cancel-safe: dropping the future leaves
    /// the deadline in place.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

/// Collapse bursts of events into one `on_fire` call per quiet period
///
/// Returns when the event sender is dropped. A pending fire is flushed first.
pub async fn debounce_loop<E, F, Fut>(
    mut events: mpsc::UnboundedReceiver<E>,
    quiet: Duration,
    mut on_fire: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut debouncer = Debouncer::new(quiet);

    loop {
        tokio::select! {
            event = events.recv() => {
                if event.is_none() {
                    break;
                }
                debouncer.arm();
            }
            () = debouncer.fired() => on_fire().await,
        }
    }

    if debouncer.is_armed() {
        on_fire().await;
    }
}

/// Watches the audio directory and rebuilds the catalog after changes settle
pub struct AssetWatcher {
    // Dropping the watcher closes the event channel and ends the refresh task
    watcher: Option<RecommendedWatcher>,
    task: JoinHandle<()>,
}

impl AssetWatcher {
    /// Start watching `dir`, rebuilding `index` after `quiet` without events
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be watched
    pub fn spawn(dir: &Path, index: Arc<AudioIndex>, quiet: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    tracing::trace!(kind = ?event.kind, paths = ?event.paths, "audio dir event");
                    let _ = tx.send(());
                }
                Err(e) => tracing::warn!(error = %e, "audio dir watch error"),
            },
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        let dir: PathBuf = dir.to_path_buf();
        tracing::info!(
            dir = %dir.display(),
            quiet_ms = quiet.as_millis(),
            "watching audio directory"
        );

        let task = tokio::spawn(async move {
            debounce_loop(rx, quiet, || {
                let index = Arc::clone(&index);
                let dir = dir.clone();
                async move {
                    if let Err(e) = refresh(&index, &dir).await {
                        tracing::warn!(error = %e, "audio catalog refresh failed");
                    }
                }
            })
            .await;
            tracing::debug!("audio watcher stopped");
        });

        Ok(Self {
            watcher: Some(watcher),
            task,
        })
    }

    /// Stop watching and wait for the refresh task to finish
    pub async fn shutdown(mut self) {
        drop(self.watcher.take());
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "audio watcher task failed");
        }
    }
}
