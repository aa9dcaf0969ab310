//! Per-channel accumulator persistence
//!
//! All channels live in one JSON document that is read whole and rewritten
//! whole on every store. Stores are serialized so a write to one channel never
//! drops another channel's state. Channels themselves are not locked: two
//! handlers doing load → mutate → store on the same channel can interleave,
//! and whichever store lands last wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use super::ChannelAccumulator;
use crate::Result;

/// On-disk shape: channel ID → accumulator
type StateDocument = BTreeMap<String, ChannelAccumulator>;

/// Disambiguates temp files from concurrent stores
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// JSON-file backed channel state
///
/// Clones share the same write lock.
#[derive(Debug, Clone)]
pub struct ChannelStateStore {
    path: PathBuf,
    // Held across read, insert, write and rename of the document
    write_lock: Arc<Mutex<()>>,
}

impl ChannelStateStore {
    /// Store backed by the document at `path` (created on first store)
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the backing document
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a channel's accumulator
    ///
    /// Missing channels, a missing document, and unreadable or corrupt
    /// documents all yield the empty accumulator.
    pub async fn load(&self, channel_id: &str) -> ChannelAccumulator {
        self.read_document()
            .await
            .remove(channel_id)
            .unwrap_or_default()
    }

    /// Persist a channel's accumulator, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be written
    pub async fn store(&self, channel_id: &str, accumulator: &ChannelAccumulator) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut document = self.read_document().await;
        document.insert(channel_id.to_string(), accumulator.clone());

        let bytes = serde_json::to_vec_pretty(&document)?;

        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .path
            .with_extension(format!("tmp.{}.{seq}", std::process::id()));

        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(e.into());
        }

        tracing::trace!(channel_id, chars = accumulator.chars.len(), "channel state stored");
        Ok(())
    }

    async fn read_document(&self) -> StateDocument {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StateDocument::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read channel state, using defaults"
                );
                return StateDocument::new();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "corrupt channel state, using defaults"
            );
            StateDocument::new()
        })
    }
}
