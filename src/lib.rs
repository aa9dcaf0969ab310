//! Disquoter - Discord soundboard bot
//!
//! Users DM the bot a clip name; it fuzzy-matches the name against the audio
//! directory and plays the best match into the voice channel they are in. Text
//! channels host an ouija game that spells messages one character at a time.
//!
//! # Architecture
//!
//! ```text
//!  audio dir ──notify──▶ Debouncer ──▶ AudioIndex
//!                                          ▲
//!  Discord ──▶ MessageRouter ──search──────┘
//!                  │    └──────▶ ouija::transition ◀──▶ ChannelStateStore
//!                  ▼
//!          PlaybackScheduler ──▶ VoiceConnectionPool ──▶ VoiceBackend
//! ```

pub mod catalog;
pub mod channels;
pub mod config;
pub mod daemon;
pub mod error;
pub mod ingest;
pub mod ouija;
pub mod router;
pub mod voice;

pub use catalog::{AssetWatcher, AudioAsset, AudioIndex, Debouncer};
pub use channels::{Attachment, ChannelKind, ChatPlatform, IncomingMessage, OutgoingMessage};
pub use config::{Config, ConfigOverrides};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use ingest::{AttachmentIngestor, IngestOutcome};
pub use ouija::{ChannelAccumulator, ChannelStateStore, OuijaChar, OuijaEffect, Transition};
pub use router::MessageRouter;
pub use voice::{
    PlayableSource, PlaybackEvent, PlaybackRequest, PlaybackScheduler, VoiceBackend,
    VoiceConnection, VoiceConnectionPool,
};
