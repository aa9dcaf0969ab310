//! Bot daemon
//!
//! Builds every component once, connects to Discord, and handles each inbound
//! message on its own task until Ctrl-C.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::catalog::{self, AssetWatcher, AudioIndex};
use crate::channels::{DiscordChannel, IncomingMessage};
use crate::ingest::AttachmentIngestor;
use crate::ouija::ChannelStateStore;
use crate::router::MessageRouter;
use crate::voice::{PlaybackScheduler, SpeakerBackend, VoiceConnectionPool};
use crate::{Config, Error, Result};

/// The running bot
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a daemon from resolved configuration
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the token is missing, the audio directory cannot be
    /// watched, or Discord login fails
    pub async fn run(self) -> Result<()> {
        let token = self
            .config
            .discord
            .token
            .clone()
            .ok_or_else(|| {
                Error::Config("DISCORD_TOKEN or discord.token is required".to_string())
            })?;

        let audio_dir = self.config.audio.files_path.clone();

        let index = Arc::new(AudioIndex::new());
        if let Err(e) = catalog::refresh(&index, &audio_dir).await {
            tracing::warn!(error = %e, "initial audio catalog load failed");
        }
        let watcher = AssetWatcher::spawn(
            &audio_dir,
            Arc::clone(&index),
            self.config.audio.rebuild_debounce,
        )?;

        let pool = Arc::new(VoiceConnectionPool::new(Arc::new(SpeakerBackend::new())));
        let (scheduler, mut worker) = PlaybackScheduler::spawn(
            pool,
            audio_dir.clone(),
            self.config.audio.playback_timeout,
        );

        let store = ChannelStateStore::new(self.config.state_path.clone());
        tracing::info!(path = %store.path().display(), "channel state store ready");

        let (mut discord, rx) = DiscordChannel::with_receiver(token);
        discord.connect().await?;

        let router = Arc::new(MessageRouter::new(
            self.config.discord.client_id.clone(),
            index,
            scheduler,
            store,
            AttachmentIngestor::new(audio_dir),
            Arc::new(discord),
        ));

        tracing::info!("disquoter is running, waiting for messages");

        let result = tokio::select! {
            () = handle_messages(rx, Arc::clone(&router)) => {
                tracing::warn!("message stream closed");
                Ok(())
            }
            res = &mut worker => {
                tracing::error!(error = ?res.err(), "playback worker exited");
                Err(Error::Playback("playback worker exited unexpectedly".to_string()))
            }
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("shutdown requested");
                Ok(())
            }
        };

        watcher.shutdown().await;
        worker.abort();

        result
    }
}

/// Spawn one task per message and log every failure
async fn handle_messages(mut rx: mpsc::Receiver<IncomingMessage>, router: Arc<MessageRouter>) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                let router = Arc::clone(&router);
                tasks.spawn(async move {
                    if let Err(e) = router.handle(&msg).await {
                        tracing::error!(
                            channel_id = %msg.channel_id,
                            author = %msg.author_name,
                            error = %e,
                            "error while handling message"
                        );
                    }
                });
            }
            Some(joined) = tasks.join_next() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "message handler panicked");
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "message handler panicked");
        }
    }
}
