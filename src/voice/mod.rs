//! Voice playback
//!
//! Clips are played through a [`VoiceBackend`], which joins voice destinations
//! and hands back a [`VoiceConnection`]. The [`VoiceConnectionPool`] caches one
//! connection per destination and the [`PlaybackScheduler`] drains the global
//! clip queue through it.

mod decode;
mod playback;
mod pool;
mod scheduler;
mod speaker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

pub use decode::{PLAYBACK_SAMPLE_RATE, decode_file, precompile, read_companion};
pub use playback::AudioPlayback;
pub use pool::VoiceConnectionPool;
pub use scheduler::{PlaybackEvent, PlaybackRequest, PlaybackScheduler};
pub use speaker::SpeakerBackend;

use crate::Result;
use crate::catalog::companion_path;

/// Identifier of a voice destination (e.g. a Discord voice channel ID)
pub type DestinationId = String;

/// A stream the backend can play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableSource {
    /// Precompiled companion file, already in the transport format
    Encoded(PathBuf),
    /// Original clip file, decoded at play time
    Raw(PathBuf),
}

impl PlayableSource {
    /// Path of the underlying file
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Encoded(path) | Self::Raw(path) => path,
        }
    }
}

/// Select the stream for a clip, preferring its precompiled companion
///
/// # Errors
///
/// Returns error if neither the companion nor the clip exists
pub async fn select_source(audio_dir: &Path, asset_name: &str) -> Result<PlayableSource> {
    let raw = audio_dir.join(asset_name);
    let companion = companion_path(&raw);

    if tokio::fs::try_exists(&companion).await.unwrap_or(false) {
        return Ok(PlayableSource::Encoded(companion));
    }

    if !tokio::fs::try_exists(&raw).await? {
        return Err(crate::Error::Playback(format!(
            "clip not found: {}",
            raw.display()
        )));
    }

    Ok(PlayableSource::Raw(raw))
}

/// A live connection to one voice destination
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Play a stream, resolving when playback stops or fails
    async fn play(&self, source: PlayableSource) -> Result<()>;

    /// Leave the destination
    async fn leave(&self) -> Result<()>;
}

/// Something that can join voice destinations
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Establish a connection to a destination
    async fn join(&self, destination: &str) -> Result<Arc<dyn VoiceConnection>>;
}
