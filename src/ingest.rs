//! Attachment ingestion
//!
//! Audio attachments sent to the bot in a DM are downloaded into the audio
//! directory under their lowercased file name. The catalog watcher picks them
//! up from there.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::channels::Attachment;
use crate::{Error, Result};

/// What happened to one attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Saved into the audio directory
    Added(String),
    /// A clip with this name already exists
    AlreadyExists(String),
    /// Content type could not be detected
    UnknownType(String),
    /// Content is not audio
    NotAudio(String),
}

impl IngestOutcome {
    /// User-facing reply for this outcome
    #[must_use]
    pub fn reply_text(&self) -> String {
        match self {
            Self::Added(name) => format!("'{name}' is now available for your disquoter enjoyment!"),
            Self::AlreadyExists(name) => format!(
                "Attachment with name '{name}' already exists. If you would like to upload this file please rename it."
            ),
            Self::UnknownType(name) => format!("Unable to find mime type for attachment: {name}"),
            Self::NotAudio(name) => format!("{name} is not an audio file"),
        }
    }
}

/// Downloads attachments into the audio directory
#[derive(Debug, Clone)]
pub struct AttachmentIngestor {
    audio_dir: PathBuf,
    http: reqwest::Client,
}

impl AttachmentIngestor {
    /// Create an ingestor writing into `audio_dir`
    #[must_use]
    pub fn new(audio_dir: PathBuf) -> Self {
        Self {
            audio_dir,
            http: reqwest::Client::new(),
        }
    }

    /// Download and store one attachment
    ///
    /// # Errors
    ///
    /// Returns error if the file name is unusable, the download fails, or the
    /// file cannot be written
    pub async fn ingest(&self, attachment: &Attachment) -> Result<IngestOutcome> {
        let name = clip_name(&attachment.filename)?;

        if tokio::fs::try_exists(self.audio_dir.join(&name)).await? {
            return Ok(IngestOutcome::AlreadyExists(name));
        }

        let data = self
            .http
            .get(&attachment.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tracing::debug!(name = %name, bytes = data.len(), "attachment downloaded");
        self.accept(&name, &data).await
    }

    /// Sniff downloaded bytes and store them if they are audio
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub async fn accept(&self, name: &str, data: &[u8]) -> Result<IngestOutcome> {
        let Some(kind) = infer::get(data) else {
            return Ok(IngestOutcome::UnknownType(name.to_string()));
        };

        if kind.matcher_type() != infer::MatcherType::Audio {
            tracing::debug!(name, mime = kind.mime_type(), "rejecting non-audio attachment");
            return Ok(IngestOutcome::NotAudio(name.to_string()));
        }

        let path = self.audio_dir.join(name);
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Ok(IngestOutcome::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(data).await?;
        file.flush().await?;

        tracing::info!(name, mime = kind.mime_type(), "clip added");
        Ok(IngestOutcome::Added(name.to_string()))
    }
}

/// Lowercased bare file name, refusing anything that would escape the audio directory
fn clip_name(filename: &str) -> Result<String> {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.starts_with('.'))
        .map(str::to_lowercase)
        .ok_or_else(|| Error::Attachment(format!("unusable file name: {filename}")))
}
