//! Error types for Disquoter

use thiserror::Error;

/// Result type alias for Disquoter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Disquoter
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Voice connection error (join/leave)
    #[error("voice error: {0}")]
    Voice(String),

    /// Audio device or decoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Playback failed for a queued clip
    #[error("playback error: {0}")]
    Playback(String),

    /// An operation did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Chat channel error
    #[error("channel error: {0}")]
    Channel(String),

    /// Attachment ingestion error
    #[error("attachment error: {0}")]
    Attachment(String),

    /// Filesystem watch error
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
