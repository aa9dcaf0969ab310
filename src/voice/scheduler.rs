//! Single-flight playback queue
//!
//! Requests from every destination share one FIFO queue drained by one worker
//! task, so a clip for destination B waits for an earlier clip on destination A.
//! The worker owns the receiving end of the queue; no other code path can
//! consume it.
//!
//! A failed clip (join failure, missing file, playback error or timeout) is
//! logged and reported as [`PlaybackEvent::Failed`], and draining continues
//! with the next request.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::{DestinationId, VoiceConnectionPool, select_source};
use crate::{Error, Result};

/// Capacity of the playback event broadcast
const EVENT_CAPACITY: usize = 64;

/// A clip to play into a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    /// Catalog name of the clip
    pub asset_name: String,

    /// Voice destination to play into
    pub destination_id: DestinationId,
}

impl PlaybackRequest {
    /// Create a request
    #[must_use]
    pub fn new(asset_name: impl Into<String>, destination_id: impl Into<String>) -> Self {
        Self {
            asset_name: asset_name.into(),
            destination_id: destination_id.into(),
        }
    }
}

/// Lifecycle signal for one queued request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The request reached the head of the queue
    Started(PlaybackRequest),
    /// Playback completed
    Finished(PlaybackRequest),
    /// Playback failed; the queue moves on
    Failed {
        /// The failed request
        request: PlaybackRequest,
        /// Rendered error
        error: String,
    },
}

/// Requests queued or playing, per destination
type PendingCounts = Arc<Mutex<HashMap<DestinationId, usize>>>;

/// Handle to the playback queue
///
/// Cheap to clone; every clone feeds the same worker. The worker exits once
/// all handles are dropped and the queue is empty.
#[derive(Clone)]
pub struct PlaybackScheduler {
    tx: mpsc::UnboundedSender<PlaybackRequest>,
    pending: PendingCounts,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackScheduler {
    /// Start the drain worker
    ///
    /// `timeout` bounds joining the destination plus playing one clip.
    #[must_use]
    pub fn spawn(
        pool: Arc<VoiceConnectionPool>,
        audio_dir: PathBuf,
        timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let pending = PendingCounts::default();

        let worker = DrainWorker {
            rx,
            pending: Arc::clone(&pending),
            pool,
            audio_dir,
            timeout,
            events: events.clone(),
        };
        let handle = tokio::spawn(worker.run());

        (
            Self {
                tx,
                pending,
                events,
            },
            handle,
        )
    }

    /// Append a request to the tail of the queue
    pub fn enqueue(&self, request: PlaybackRequest) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let destination = request.destination_id.clone();

        tracing::debug!(
            asset = %request.asset_name,
            destination = %destination,
            "queueing clip"
        );

        if let Err(e) = self.tx.send(request) {
            tracing::error!(asset = %e.0.asset_name, "playback worker is gone, dropping clip");
            return;
        }

        *pending.entry(destination).or_insert(0) += 1;
    }

    /// Subscribe to playback lifecycle events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Number of requests queued or playing
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

/// The one consumer of the playback queue
struct DrainWorker {
    rx: mpsc::UnboundedReceiver<PlaybackRequest>,
    pending: PendingCounts,
    pool: Arc<VoiceConnectionPool>,
    audio_dir: PathBuf,
    timeout: Duration,
    events: broadcast::Sender<PlaybackEvent>,
}

impl DrainWorker {
    async fn run(mut self) {
        tracing::debug!("playback worker started");

        while let Some(request) = self.rx.recv().await {
            self.play_head(&request).await;

            if self.settle(&request.destination_id) {
                self.pool.release(&request.destination_id).await;
            }
        }

        tracing::debug!("playback worker stopped");
    }

    async fn play_head(&self, request: &PlaybackRequest) {
        let _ = self.events.send(PlaybackEvent::Started(request.clone()));

        let outcome = tokio::time::timeout(self.timeout, self.deliver(request))
            .await
            .unwrap_or(Err(Error::Timeout(self.timeout)));

        match outcome {
            Ok(()) => {
                tracing::info!(
                    asset = %request.asset_name,
                    destination = %request.destination_id,
                    "clip played"
                );
                let _ = self.events.send(PlaybackEvent::Finished(request.clone()));
            }
            Err(e) => {
                tracing::warn!(
                    asset = %request.asset_name,
                    destination = %request.destination_id,
                    error = %e,
                    "clip failed, continuing with queue"
                );
                let _ = self.events.send(PlaybackEvent::Failed {
                    request: request.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    async fn deliver(&self, request: &PlaybackRequest) -> Result<()> {
        let connection = self.pool.acquire(&request.destination_id).await?;
        let source = select_source(&self.audio_dir, &request.asset_name).await?;

        tracing::debug!(
            asset = %request.asset_name,
            source = %source.path().display(),
            "starting playback"
        );

        connection.play(source).await
    }

    /// Mark the head request done; true if nothing else targets its destination
    fn settle(&self, destination: &str) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        let remaining = pending.get_mut(destination).map_or(0, |count| {
            *count = count.saturating_sub(1);
            *count
        });

        if remaining == 0 {
            pending.remove(destination);
            true
        } else {
            false
        }
    }
}
