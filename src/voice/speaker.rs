//! Local speaker voice backend
//!
//! Plays every destination through the host's default output device. Useful
//! when the output device is routed into a voice client, and for testing clips
//! without a voice transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{
    AudioPlayback, PlayableSource, VoiceBackend, VoiceConnection, decode_file, read_companion,
};
use crate::{Error, Result};

/// Voice backend backed by the default output device
#[derive(Debug, Default)]
pub struct SpeakerBackend;

impl SpeakerBackend {
    /// Create the backend
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VoiceBackend for SpeakerBackend {
    fn name(&self) -> &'static str {
        "speaker"
    }

    async fn join(&self, destination: &str) -> Result<Arc<dyn VoiceConnection>> {
        // Probe the device up front so a missing device fails the join, not the play
        tokio::task::spawn_blocking(|| AudioPlayback::new().map(drop))
            .await
            .map_err(|e| Error::Voice(format!("device probe panicked: {e}")))??;

        tracing::info!(destination, "speaker connection opened");
        Ok(Arc::new(SpeakerConnection {
            destination: destination.to_string(),
        }))
    }
}

/// A destination label over the shared output device
struct SpeakerConnection {
    destination: String,
}

#[async_trait]
impl VoiceConnection for SpeakerConnection {
    async fn play(&self, source: PlayableSource) -> Result<()> {
        tracing::debug!(
            destination = %self.destination,
            source = %source.path().display(),
            "speaker playback"
        );

        run_cancellable(move |cancel| {
            let samples = match &source {
                PlayableSource::Encoded(path) => read_companion(path)?,
                PlayableSource::Raw(path) => decode_file(path)?,
            };
            if cancel.load(Ordering::Acquire) {
                return Ok(());
            }
            AudioPlayback::new()?.play_blocking(samples, &cancel)
        })
        .await
    }

    async fn leave(&self) -> Result<()> {
        tracing::info!(destination = %self.destination, "speaker connection closed");
        Ok(())
    }
}

/// Sets the flag when dropped
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Run blocking work that stops once the awaiting future is dropped
///
/// Dropping a `spawn_blocking` handle does not stop the thread, so `work`
/// receives a flag that is raised when this future goes away (a playback
/// timeout, for instance) and must poll it.
async fn run_cancellable<F>(work: F) -> Result<()>
where
    F: FnOnce(Arc<AtomicBool>) -> Result<()> + Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let _guard = CancelOnDrop(Arc::clone(&cancel));

    tokio::task::spawn_blocking(move || work(cancel))
        .await
        .map_err(|e| Error::Playback(format!("playback task panicked: {e}")))?
}
