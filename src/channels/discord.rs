//! Discord channel adapter using serenity

use std::sync::Arc;

use async_trait::async_trait;
use serenity::Client;
use serenity::all::{
    ChannelId, Context, CreateMessage, EventHandler, GatewayIntents, Message, MessageId, Ready,
    UserId,
};
use tokio::sync::mpsc;

use super::{Attachment, ChannelKind, ChatPlatform, IncomingMessage, OutgoingMessage};
use crate::{Error, Result};

/// Discord channel adapter
pub struct DiscordChannel {
    token: String,
    message_tx: Option<mpsc::Sender<IncomingMessage>>,
    http: Option<Arc<serenity::http::Http>>,
}

impl DiscordChannel {
    /// Create with a message receiver
    ///
    /// Returns the channel and a receiver for incoming messages
    #[must_use]
    pub fn with_receiver(token: String) -> (Self, mpsc::Receiver<IncomingMessage>) {
        let (tx, rx) = mpsc::channel(100);
        let channel = Self {
            token,
            message_tx: Some(tx),
            http: None,
        };
        (channel, rx)
    }

    /// Log in and start receiving events in a background task
    ///
    /// # Errors
    ///
    /// Returns error if the client cannot be built
    pub async fn connect(&mut self) -> Result<()> {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::GUILD_VOICE_STATES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let message_tx = self
            .message_tx
            .take()
            .ok_or_else(|| Error::Channel("Discord already connected".to_string()))?;

        let handler = DiscordHandler { message_tx };

        let mut client = Client::builder(&self.token, intents)
            .event_handler(handler)
            .await
            .map_err(|e| Error::Channel(format!("Discord client error: {e}")))?;

        self.http = Some(client.http.clone());

        tokio::spawn(async move {
            if let Err(e) = client.start().await {
                tracing::error!(error = %e, "Discord client error");
            }
        });

        tracing::info!("Discord channel connected");
        Ok(())
    }

    fn http(&self) -> Result<&Arc<serenity::http::Http>> {
        self.http
            .as_ref()
            .ok_or_else(|| Error::Channel("Discord not connected".to_string()))
    }
}

/// Parse a Discord snowflake
fn parse_id(raw: &str, what: &str) -> Result<u64> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| Error::Channel(format!("Invalid {what} ID: {raw}")))
}

#[async_trait]
impl ChatPlatform for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        let http = self.http()?;
        let channel = ChannelId::new(parse_id(&message.channel_id, "channel")?);

        let mut builder = CreateMessage::new()
            .content(&message.content)
            .tts(message.tts);

        if let Some(reply_to) = &message.reply_to {
            let reference = MessageId::new(parse_id(reply_to, "message")?);
            builder = builder.reference_message((channel, reference));
        }

        channel
            .send_message(http, builder)
            .await
            .map_err(|e| Error::Channel(format!("Discord send error: {e}")))?;

        tracing::debug!(
            channel_id = %message.channel_id,
            tts = message.tts,
            "Discord message sent"
        );
        Ok(())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        let http = self.http()?;
        let channel = ChannelId::new(parse_id(channel_id, "channel")?);
        let message = MessageId::new(parse_id(message_id, "message")?);

        http.delete_message(channel, message, None)
            .await
            .map_err(|e| Error::Channel(format!("Discord delete error: {e}")))?;

        tracing::debug!(channel_id, message_id, "Discord message deleted");
        Ok(())
    }

    async fn send_direct(&self, user_id: &str, content: &str) -> Result<()> {
        let http = self.http()?;
        let user = UserId::new(parse_id(user_id, "user")?);

        let dm = user
            .create_dm_channel(http)
            .await
            .map_err(|e| Error::Channel(format!("Discord DM channel error: {e}")))?;

        dm.id
            .send_message(http, CreateMessage::new().content(content))
            .await
            .map_err(|e| Error::Channel(format!("Discord DM send error: {e}")))?;

        tracing::debug!(user_id, "Discord direct message sent");
        Ok(())
    }
}

/// Discord event handler
struct DiscordHandler {
    message_tx: mpsc::Sender<IncomingMessage>,
}

/// Voice channel the author is connected to
///
/// Checks the message's guild first, then every cached guild (for DMs).
fn voice_destination(ctx: &Context, msg: &Message) -> Option<String> {
    let guilds = msg.guild_id.map_or_else(|| ctx.cache.guilds(), |g| vec![g]);

    guilds.into_iter().find_map(|guild_id| {
        let guild = ctx.cache.guild(guild_id)?;
        guild
            .voice_states
            .get(&msg.author.id)
            .and_then(|state| state.channel_id)
            .map(|channel| channel.to_string())
    })
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, id = %ready.user.id, "Discord bot ready");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Ignore our own messages
        if msg.author.id == ctx.cache.current_user().id {
            return;
        }

        let kind = if msg.guild_id.is_none() {
            ChannelKind::Direct
        } else {
            ChannelKind::Text
        };

        let attachments = msg
            .attachments
            .iter()
            .map(|att| Attachment {
                url: att.url.clone(),
                filename: att.filename.clone(),
                content_type: att.content_type.clone(),
            })
            .collect();

        let incoming = IncomingMessage {
            id: msg.id.to_string(),
            channel_id: msg.channel_id.to_string(),
            author_id: msg.author.id.to_string(),
            author_name: msg.author.name.clone(),
            kind,
            content: msg.content.clone(),
            attachments,
            voice_destination: voice_destination(&ctx, &msg),
        };

        tracing::debug!(
            author = %msg.author.name,
            content = %msg.content,
            ?kind,
            "Discord message received"
        );

        if let Err(e) = self.message_tx.send(incoming).await {
            tracing::warn!(error = %e, "Failed to forward Discord message");
        }
    }
}
