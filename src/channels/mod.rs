//! Chat platform adapters
//!
//! Each platform implements [`ChatPlatform`] for outbound actions and delivers
//! inbound [`IncomingMessage`]s through an mpsc receiver.

mod discord;

use async_trait::async_trait;

pub use discord::DiscordChannel;

use crate::Result;
use crate::voice::DestinationId;

/// Where a message was posted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Private conversation with the bot
    Direct,
    /// Shared text channel
    Text,
}

/// A file attached to an incoming message
#[derive(Debug, Clone)]
pub struct Attachment {
    /// URL to download the attachment
    pub url: String,

    /// Original filename
    pub filename: String,

    /// MIME type claimed by the platform, if any
    pub content_type: Option<String>,
}

/// A message from a chat platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Message identifier (platform-specific)
    pub id: String,

    /// Channel identifier
    pub channel_id: String,

    /// Sender identifier
    pub author_id: String,

    /// Sender display name
    pub author_name: String,

    /// Kind of channel the message arrived in
    pub kind: ChannelKind,

    /// Message content
    pub content: String,

    /// Attachments on the message
    pub attachments: Vec<Attachment>,

    /// Voice destination the author is currently in, if any
    pub voice_destination: Option<DestinationId>,
}

/// A message to send to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Channel identifier
    pub channel_id: String,

    /// Message content
    pub content: String,

    /// Optional reply-to message ID
    pub reply_to: Option<String>,

    /// Ask clients to read the message aloud
    pub tts: bool,
}

impl OutgoingMessage {
    /// Create a simple `text` message
    #[must_use]
    pub const fn text(channel_id: String, content: String) -> Self {
        Self {
            channel_id,
            content,
            reply_to: None,
            tts: false,
        }
    }

    /// Create a `reply` message
    #[must_use]
    pub const fn reply(channel_id: String, content: String, reply_to: String) -> Self {
        Self {
            channel_id,
            content,
            reply_to: Some(reply_to),
            tts: false,
        }
    }

    /// Create a message to be read aloud
    #[must_use]
    pub const fn speech(channel_id: String, content: String) -> Self {
        Self {
            channel_id,
            content,
            reply_to: None,
            tts: true,
        }
    }
}

/// Outbound actions on a chat platform
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Get the platform name
    fn name(&self) -> &'static str;

    /// Send a message to a channel
    async fn send(&self, message: OutgoingMessage) -> Result<()>;

    /// Delete a message
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()>;

    /// Send a private message to a user
    async fn send_direct(&self, user_id: &str, content: &str) -> Result<()>;

    /// Reply to an incoming message in its channel
    async fn reply(&self, to: &IncomingMessage, content: &str) -> Result<()> {
        self.send(OutgoingMessage::reply(
            to.channel_id.clone(),
            content.to_string(),
            to.id.clone(),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_constructors() {
        let text = OutgoingMessage::text("c".to_string(), "hi".to_string());
        assert!(!text.tts);
        assert!(text.reply_to.is_none());

        let reply = OutgoingMessage::reply("c".to_string(), "hi".to_string(), "m".to_string());
        assert_eq!(reply.reply_to.as_deref(), Some("m"));

        let speech = OutgoingMessage::speech("c".to_string(), "hi".to_string());
        assert!(speech.tts);
    }
}
