//! Inbound message dispatch
//!
//! Direct messages search the catalog and queue the best match, ingest audio
//! attachments, and answer `version`. Text-channel messages feed the ouija game.

use std::sync::Arc;

use crate::Result;
use crate::catalog::AudioIndex;
use crate::channels::{ChannelKind, ChatPlatform, IncomingMessage, OutgoingMessage};
use crate::ingest::AttachmentIngestor;
use crate::ouija::{self, ChannelStateStore, OuijaEffect, Transition};
use crate::voice::{PlaybackRequest, PlaybackScheduler};

/// DM command that replies with the running version
const VERSION_COMMAND: &str = "version";

/// Routes chat messages to playback, ingestion, or the ouija game
pub struct MessageRouter {
    self_id: Option<String>,
    index: Arc<AudioIndex>,
    scheduler: PlaybackScheduler,
    store: ChannelStateStore,
    ingestor: AttachmentIngestor,
    platform: Arc<dyn ChatPlatform>,
}

impl MessageRouter {
    /// Create a router
    ///
    /// Messages authored by `self_id` are ignored.
    #[must_use]
    pub fn new(
        self_id: Option<String>,
        index: Arc<AudioIndex>,
        scheduler: PlaybackScheduler,
        store: ChannelStateStore,
        ingestor: AttachmentIngestor,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self {
            self_id,
            index,
            scheduler,
            store,
            ingestor,
            platform,
        }
    }

    /// Handle one inbound message
    ///
    /// # Errors
    ///
    /// Returns error if a reply, delete, or state write fails
    pub async fn handle(&self, msg: &IncomingMessage) -> Result<()> {
        if self.self_id.as_deref() == Some(msg.author_id.as_str()) {
            return Ok(());
        }

        match msg.kind {
            ChannelKind::Direct => self.handle_direct(msg).await,
            ChannelKind::Text => self.handle_ouija(msg).await,
        }
    }

    async fn handle_direct(&self, msg: &IncomingMessage) -> Result<()> {
        let query = msg.content.trim();

        if query == VERSION_COMMAND {
            return self.platform.reply(msg, env!("CARGO_PKG_VERSION")).await;
        }

        if !query.is_empty() {
            let searched = self.search_and_play(msg, query).await;
            if let Err(e) = searched {
                tracing::warn!(
                    query,
                    author = %msg.author_name,
                    error = %e,
                    "search reply failed, continuing with attachments"
                );
            }
        }

        for attachment in &msg.attachments {
            let reply = match self.ingestor.ingest(attachment).await {
                Ok(outcome) => outcome.reply_text(),
                Err(e) => {
                    tracing::warn!(
                        filename = %attachment.filename,
                        error = %e,
                        "attachment ingestion failed"
                    );
                    format!("Failed to add attachment: {}", attachment.filename)
                }
            };
            self.platform.reply(msg, &reply).await?;
        }

        Ok(())
    }

    async fn search_and_play(&self, msg: &IncomingMessage, query: &str) -> Result<()> {
        let Some(best) = self.index.search(query).into_iter().next() else {
            return self
                .platform
                .reply(msg, &format!("Couldn't find anything that matches '{query}'"))
                .await;
        };

        match &msg.voice_destination {
            Some(destination) => {
                tracing::info!(
                    query,
                    asset = %best.name,
                    destination = %destination,
                    author = %msg.author_name,
                    "clip requested"
                );
                self.scheduler
                    .enqueue(PlaybackRequest::new(best.name, destination.clone()));
                Ok(())
            }
            None => {
                self.platform
                    .reply(
                        msg,
                        &format!(
                            "Would have played '{}', but you are not in a voice channel!",
                            best.name
                        ),
                    )
                    .await
            }
        }
    }

    async fn handle_ouija(&self, msg: &IncomingMessage) -> Result<()> {
        let current = self.store.load(&msg.channel_id).await;

        let Transition::Updated {
            accumulator,
            effects,
        } = ouija::transition(&current, &msg.author_id, &msg.content)
        else {
            return Ok(());
        };

        for effect in effects {
            match effect {
                OuijaEffect::Reject { notice } => {
                    tracing::debug!(
                        channel_id = %msg.channel_id,
                        author = %msg.author_name,
                        "ouija repeat rejected"
                    );
                    self.platform
                        .delete_message(&msg.channel_id, &msg.id)
                        .await?;
                    self.platform.send_direct(&msg.author_id, &notice).await?;
                }
                OuijaEffect::Speak(text) => {
                    tracing::info!(
                        channel_id = %msg.channel_id,
                        text = %text,
                        "ouija says goodbye"
                    );
                    self.platform
                        .send(OutgoingMessage::speech(msg.channel_id.clone(), text))
                        .await?;
                }
            }
        }

        self.store.store(&msg.channel_id, &accumulator).await
    }
}
