//! Configuration management for Disquoter

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};
use file::DisquoterConfigFile;

/// Default quiet period before the catalog is rebuilt
pub const DEFAULT_REBUILD_DEBOUNCE_MS: u64 = 1000;

/// Default bound on joining a destination and playing one clip
pub const DEFAULT_PLAYBACK_TIMEOUT_SECS: u64 = 300;

/// Disquoter configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the config file was read from
    pub config_dir: PathBuf,

    /// Discord credentials
    pub discord: DiscordConfig,

    /// Audio catalog and playback configuration
    pub audio: AudioConfig,

    /// Path to the JSON document holding per-channel state
    pub state_path: PathBuf,
}

/// Discord credentials
#[derive(Clone, Default)]
pub struct DiscordConfig {
    /// Bot token
    pub token: Option<String>,

    /// Bot user ID; messages from this author are ignored
    pub client_id: Option<String>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Audio catalog and playback configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Directory holding the audio clips
    pub files_path: PathBuf,

    /// Quiet period before the catalog is rebuilt after a change
    pub rebuild_debounce: Duration,

    /// Upper bound on joining a destination and playing one clip
    pub playback_timeout: Duration,
}

/// Command-line overrides, applied after env and file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Config directory (`--config-dir`)
    pub config_dir: Option<PathBuf>,

    /// Audio directory (`--audio-dir`)
    pub audio_dir: Option<PathBuf>,

    /// Channel state document (`--state-path`)
    pub state_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration (cli > env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let config_dir = overrides
            .config_dir
            .clone()
            .unwrap_or_else(file::default_config_dir);
        let fc = file::load_config_file(&config_dir);

        let config = Self::resolve(
            config_dir,
            fc,
            |key| std::env::var(key).ok(),
            overrides,
            &default_data_dir(),
        )?;

        // Ensure the audio directory exists before anything watches it
        if !config.audio.files_path.exists() {
            tracing::info!(
                path = %config.audio.files_path.display(),
                "creating audio files directory"
            );
        }
        std::fs::create_dir_all(&config.audio.files_path)?;

        if let Some(parent) = config.state_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        Ok(config)
    }

    /// Merge file values, environment lookups and CLI overrides
    ///
    /// # Errors
    ///
    /// Returns error if an environment value cannot be parsed
    pub fn resolve(
        config_dir: PathBuf,
        fc: DisquoterConfigFile,
        env: impl Fn(&str) -> Option<String>,
        overrides: &ConfigOverrides,
        data_dir: &std::path::Path,
    ) -> Result<Self> {
        let discord = DiscordConfig {
            token: env("DISCORD_TOKEN").or(fc.discord.token),
            client_id: env("DISCORD_CLIENT_ID").or(fc.discord.client_id),
        };

        let files_path = overrides
            .audio_dir
            .clone()
            .or_else(|| env("DISQUOTER_AUDIO_DIR").map(PathBuf::from))
            .or_else(|| fc.audio.files_path.map(PathBuf::from))
            .unwrap_or_else(|| data_dir.join("audio"));

        let rebuild_debounce_ms = match env("DISQUOTER_REBUILD_DEBOUNCE_MS") {
            Some(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("DISQUOTER_REBUILD_DEBOUNCE_MS is not a number: {raw}"))
            })?,
            None => fc
                .audio
                .rebuild_debounce_ms
                .unwrap_or(DEFAULT_REBUILD_DEBOUNCE_MS),
        };

        let playback_timeout_secs = fc
            .audio
            .playback_timeout_secs
            .unwrap_or(DEFAULT_PLAYBACK_TIMEOUT_SECS);
        if playback_timeout_secs == 0 {
            return Err(Error::Config(
                "audio.playback_timeout_secs must be greater than zero".to_string(),
            ));
        }

        let state_path = overrides
            .state_path
            .clone()
            .or_else(|| env("DISQUOTER_STATE_PATH").map(PathBuf::from))
            .or_else(|| fc.state.path.map(PathBuf::from))
            .unwrap_or_else(|| data_dir.join("channel_state.json"));

        Ok(Self {
            config_dir,
            discord,
            audio: AudioConfig {
                files_path,
                rebuild_debounce: Duration::from_millis(rebuild_debounce_ms),
                playback_timeout: Duration::from_secs(playback_timeout_secs),
            },
            state_path,
        })
    }
}

/// Data directory (`~/.local/share/disquoter` on Linux)
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("disquoter"))
}
