//! Audio clip catalog
//!
//! The catalog is an immutable snapshot of asset names. Each rebuild swaps in a
//! whole new snapshot; searches clone the current `Arc` and never block a rebuild
//! for longer than the pointer swap.

mod watcher;

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

pub use watcher::{AssetWatcher, Debouncer, debounce_loop};

use crate::Result;

/// Extension of precompiled companion files (raw f32le mono PCM at 24 kHz)
pub const COMPANION_EXTENSION: &str = "pcm";

/// Minimum Jaro-Winkler similarity for a fuzzy match
const FUZZY_THRESHOLD: f64 = 0.7;

/// A playable clip in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioAsset {
    /// File name inside the audio directory
    pub name: String,
}

impl AudioAsset {
    /// Lowercased file name without extension
    fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map_or_else(|| self.name.clone(), |s| s.to_string_lossy().into_owned())
            .to_lowercase()
    }
}

/// Fuzzy-searchable catalog of audio clips
#[derive(Debug)]
pub struct AudioIndex {
    snapshot: RwLock<Arc<[AudioAsset]>>,
}

impl Default for AudioIndex {
    fn default() -> Self {
        Self {
            snapshot: RwLock::new(Arc::from(Vec::new())),
        }
    }
}

impl AudioIndex {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire catalog with the given names
    pub fn rebuild<I>(&self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut assets: Vec<AudioAsset> =
            names.into_iter().map(|name| AudioAsset { name }).collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        assets.dedup();

        let count = assets.len();
        let next: Arc<[AudioAsset]> = Arc::from(assets);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;

        tracing::debug!(count, "audio catalog rebuilt");
    }

    /// Number of assets in the current snapshot
    #[must_use]
    pub fn len(&self) -> usize {
        self.current().len()
    }

    /// Whether the current snapshot is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    /// Search the catalog, best match first
    ///
    /// Matching is case-insensitive. An empty result means no match.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<AudioAsset> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let snapshot = self.current();
        let mut scored: Vec<(f64, &AudioAsset)> = snapshot
            .iter()
            .filter_map(|asset| score(&query, asset).map(|s| (s, asset)))
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| match sb.total_cmp(sa) {
            Ordering::Equal => a.name.cmp(&b.name),
            other => other,
        });

        scored.into_iter().map(|(_, asset)| asset.clone()).collect()
    }

    fn current(&self) -> Arc<[AudioAsset]> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Rank an asset against a lowercased query
///
/// Exact name matches outrank prefix matches, which outrank substring matches,
/// which outrank plain similarity.
fn score(query: &str, asset: &AudioAsset) -> Option<f64> {
    let name = asset.name.to_lowercase();
    let stem = asset.stem();

    if name == query || stem == query {
        return Some(3.0);
    }

    let similarity = strsim::jaro_winkler(query, &stem);

    if stem.starts_with(query) {
        Some(2.0 + similarity)
    } else if stem.contains(query) {
        Some(1.0 + similarity)
    } else if similarity >= FUZZY_THRESHOLD {
        Some(similarity)
    } else {
        None
    }
}

/// Whether a file name is a precompiled companion rather than a clip
#[must_use]
pub fn is_companion(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(COMPANION_EXTENSION))
}

/// Path of the precompiled companion for a clip
#[must_use]
pub fn companion_path(clip: &Path) -> PathBuf {
    clip.with_extension(COMPANION_EXTENSION)
}

/// List catalog-eligible file names in the audio directory
///
/// Hidden files, directories and companion files are skipped.
///
/// # Errors
///
/// Returns error if the directory cannot be read
pub async fn list_asset_names(dir: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };

        if name.starts_with('.') || is_companion(&name) {
            continue;
        }

        names.push(name);
    }

    Ok(names)
}

/// Rebuild the index from the current contents of the audio directory
///
/// # Errors
///
/// Returns error if the directory cannot be read
pub async fn refresh(index: &AudioIndex, dir: &Path) -> Result<usize> {
    let names = list_asset_names(dir).await?;
    let count = names.len();
    index.rebuild(names);
    tracing::info!(count, dir = %dir.display(), "refreshed audio files list");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(names: &[&str]) -> AudioIndex {
        let index = AudioIndex::new();
        index.rebuild(names.iter().map(ToString::to_string));
        index
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let index = index_of(&["horn.wav", "applause.mp3"]);
        let results = index.search("HORN");
        assert_eq!(results[0].name, "horn.wav");
    }

    #[test]
    fn test_exact_match_ranks_first() {
        let index = index_of(&["hornet.wav", "horn.wav", "shorn.mp3"]);
        let results = index.search("horn");
        assert_eq!(results[0].name, "horn.wav");
        assert!(results.len() >= 2);
    }

    #[test]
    fn test_misspelling_still_matches() {
        let index = index_of(&["applause.mp3", "drumroll.wav"]);
        let results = index.search("aplause");
        assert_eq!(results[0].name, "applause.mp3");
    }

    #[test]
    fn test_extension_does_not_match() {
        let index = index_of(&["horn.wav", "wave.mp3"]);
        let names: Vec<String> = index.search("wav").into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["wave.mp3"]);
        assert!(index.search(".").is_empty());
    }

    #[test]
    fn test_no_match_is_empty() {
        let index = index_of(&["horn.wav"]);
        assert!(index.search("xylophone concerto").is_empty());
        assert!(index.search("   ").is_empty());
    }

    #[test]
    fn test_rebuild_replaces_snapshot() {
        let index = index_of(&["horn.wav"]);
        index.rebuild(vec!["bell.wav".to_string()]);

        assert_eq!(index.len(), 1);
        assert!(index.search("horn").is_empty());
        assert_eq!(index.search("bell")[0].name, "bell.wav");
    }

    #[test]
    fn test_rebuild_dedups() {
        let index = index_of(&["horn.wav", "horn.wav"]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_companion_detection() {
        assert!(is_companion("horn.pcm"));
        assert!(is_companion("horn.PCM"));
        assert!(!is_companion("horn.wav"));
        assert_eq!(
            companion_path(Path::new("/a/horn.wav")),
            PathBuf::from("/a/horn.pcm")
        );
    }

    #[tokio::test]
    async fn test_list_asset_names_skips_companions_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("horn.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("horn.pcm"), b"x").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let mut names = list_asset_names(dir.path()).await.unwrap();
        names.sort();
        assert_eq!(names, vec!["horn.wav".to_string()]);
    }
}
