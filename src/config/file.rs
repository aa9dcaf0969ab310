//! TOML configuration file loading
//!
//! Supports `<config_dir>/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DisquoterConfigFile {
    /// Discord credentials
    #[serde(default)]
    pub discord: DiscordFileConfig,

    /// Audio catalog and playback configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Persisted channel state
    #[serde(default)]
    pub state: StateFileConfig,
}

/// Discord credentials
#[derive(Debug, Default, Deserialize)]
pub struct DiscordFileConfig {
    /// Bot token
    pub token: Option<String>,

    /// Bot user ID; messages from this author are ignored
    pub client_id: Option<String>,
}

/// Audio catalog and playback configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Directory holding the audio clips
    pub files_path: Option<String>,

    /// Quiet period before the catalog is rebuilt after a change
    pub rebuild_debounce_ms: Option<u64>,

    /// Upper bound on joining a destination and playing one clip
    pub playback_timeout_secs: Option<u64>,
}

/// Persisted channel state configuration
#[derive(Debug, Default, Deserialize)]
pub struct StateFileConfig {
    /// Path to the JSON document holding per-channel state
    pub path: Option<String>,
}

/// Load `config.toml` from the given config directory
///
/// Returns `DisquoterConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(config_dir: &Path) -> DisquoterConfigFile {
    let path = config_dir.join("config.toml");

    if !path.exists() {
        return DisquoterConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                DisquoterConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            DisquoterConfigFile::default()
        }
    }
}

/// Return the default config directory: `~/.config/disquoter`
pub fn default_config_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".config/disquoter"),
        |d| d.config_dir().join("disquoter"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let fc: DisquoterConfigFile = toml::from_str(
            r#"
            [discord]
            token = "abc"

            [audio]
            rebuild_debounce_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(fc.discord.token.as_deref(), Some("abc"));
        assert!(fc.discord.client_id.is_none());
        assert_eq!(fc.audio.rebuild_debounce_ms, Some(250));
        assert!(fc.state.path.is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fc = load_config_file(dir.path());
        assert!(fc.discord.token.is_none());
        assert!(fc.audio.files_path.is_none());
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[discord\ntoken = ").unwrap();
        let fc = load_config_file(dir.path());
        assert!(fc.discord.token.is_none());
    }
}
