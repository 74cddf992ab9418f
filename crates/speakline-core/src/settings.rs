//! Settings domain types, loading, and validation.
//!
//! Settings are stored as camelCase JSON. Every section and field carries a
//! serde default, so a partial file is merged field by field over the
//! defaults and a missing file yields [`Settings::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ChunkMode, VoiceConfig};

/// Default host of the speech engine.
pub const DEFAULT_HOST: &str = "localhost";

/// Default port of the speech engine.
pub const DEFAULT_PORT: u16 = 50032;

/// Default speaker UUID (the engine's bundled standard voice).
pub const DEFAULT_SPEAKER_ID: &str = "3c37646f-3881-5374-2a83-149267990abc";

/// Sample rate requested from the engine.
pub const DEFAULT_SYNTHESIS_RATE: u32 = 24_000;

/// Environment variable overriding [`ConnectionSettings::host`].
pub const HOST_ENV: &str = "SPEAKLINE_HOST";

/// Environment variable overriding [`ConnectionSettings::port`].
pub const PORT_ENV: &str = "SPEAKLINE_PORT";

/// Application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub voice: VoiceSettings,
    pub audio: AudioSettings,
}

/// Where the speech engine lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    /// Per-request timeout for synthesis calls, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout_ms: 30_000,
        }
    }
}

impl ConnectionSettings {
    /// Base URL of the engine, e.g. `http://localhost:50032`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Voice defaults used when a request does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoiceSettings {
    pub default_speaker_id: String,
    pub default_style_id: i32,
    /// Speech rate in words per minute.
    pub rate: u32,
    pub volume_scale: f32,
    pub pitch_scale: f32,
    pub intonation_scale: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            default_speaker_id: DEFAULT_SPEAKER_ID.to_string(),
            default_style_id: 0,
            rate: crate::domain::speed::BASE_RATE_WPM,
            volume_scale: 1.0,
            pitch_scale: 0.0,
            intonation_scale: 1.0,
        }
    }
}

impl VoiceSettings {
    /// Resolve the voice for a request, preferring the request's overrides.
    pub fn resolve(&self, speaker_id: Option<&str>, style_id: Option<i32>) -> VoiceConfig {
        VoiceConfig::new(
            speaker_id.unwrap_or(&self.default_speaker_id),
            style_id.unwrap_or(self.default_style_id),
        )
    }
}

/// Audio generation and output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioSettings {
    pub split_mode: ChunkMode,
    pub split_settings: SplitSettings,
    pub padding_settings: PaddingSettings,
    pub synthesis_rate: u32,
    pub parallel_generation: ParallelGenerationSettings,
    /// Player command that reads a WAV stream on stdin.
    pub player_command: Vec<String>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            split_mode: ChunkMode::default(),
            split_settings: SplitSettings::default(),
            padding_settings: PaddingSettings::default(),
            synthesis_rate: DEFAULT_SYNTHESIS_RATE,
            parallel_generation: ParallelGenerationSettings::default(),
            player_command: default_player_command(),
        }
    }
}

fn default_player_command() -> Vec<String> {
    let argv: &[&str] = if cfg!(target_os = "linux") {
        &["aplay", "-q", "-"]
    } else {
        &["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet", "-"]
    };
    argv.iter().map(ToString::to_string).collect()
}

/// Chunk sizes for each split mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SplitSettings {
    pub small_size: usize,
    pub medium_size: usize,
    pub large_size: usize,
    /// Fraction of a fixed-size chunk repeated at the start of the next one.
    pub overlap_ratio: f64,
    /// Upper bound for merged sentences in punctuation mode.
    pub punctuation_max_chunk: usize,
    /// Sentences shorter than this are merged with a neighbour.
    pub punctuation_min_chunk: usize,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            small_size: 30,
            medium_size: 50,
            large_size: 100,
            overlap_ratio: 0.1,
            punctuation_max_chunk: 150,
            punctuation_min_chunk: 10,
        }
    }
}

/// Silence padding the engine adds around chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaddingSettings {
    pub enabled: bool,
    /// Seconds of silence before speech.
    pub pre_phoneme_length: f32,
    /// Seconds of silence after speech.
    pub post_phoneme_length: f32,
    /// Only pad the first chunk of a request.
    pub first_chunk_only: bool,
}

impl Default for PaddingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            pre_phoneme_length: 0.01,
            post_phoneme_length: 0.01,
            first_chunk_only: true,
        }
    }
}

/// Concurrency knobs for chunk generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParallelGenerationSettings {
    pub enabled: bool,
    pub max_concurrency: usize,
    pub delay_between_requests_ms: u64,
    pub pause_until_first_complete: bool,
    pub buffer_ahead_count: usize,
}

impl Default for ParallelGenerationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrency: 2,
            delay_between_requests_ms: 100,
            pause_until_first_complete: true,
            buffer_ahead_count: 1,
        }
    }
}

/// Errors that can occur when loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Port must be non-zero")]
    InvalidPort,

    #[error("Host must not be empty")]
    EmptyHost,

    #[error("Max concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("Overlap ratio must be between 0 and 0.5, got {0}")]
    InvalidOverlapRatio(f64),

    #[error("Chunk size '{0}' must be at least 1")]
    InvalidChunkSize(&'static str),

    #[error("Synthesis rate must be between 8000 and 192000 Hz, got {0}")]
    InvalidSynthesisRate(u32),

    #[error("Player command must not be empty")]
    EmptyPlayerCommand,

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Settings {
    /// Default settings file location: `<config dir>/speakline/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("speakline").join("config.json"))
    }

    /// Load settings from `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let settings: Self =
            serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    /// Apply `SPEAKLINE_HOST` / `SPEAKLINE_PORT` from the process environment.
    pub fn apply_env(&mut self) -> Result<(), SettingsError> {
        self.apply_overrides(
            std::env::var(HOST_ENV).ok().as_deref(),
            std::env::var(PORT_ENV).ok().as_deref(),
        )
    }

    fn apply_overrides(
        &mut self,
        host: Option<&str>,
        port: Option<&str>,
    ) -> Result<(), SettingsError> {
        if let Some(host) = host.map(str::trim).filter(|h| !h.is_empty()) {
            self.connection.host = host.to_string();
        }
        if let Some(port) = port {
            self.connection.port = port.trim().parse().map_err(|_| SettingsError::InvalidEnv {
                name: PORT_ENV,
                value: port.to_string(),
            })?;
        }
        Ok(())
    }

    /// Validate, returning the first problem found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_settings(self)
    }
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if settings.connection.host.trim().is_empty() {
        return Err(SettingsError::EmptyHost);
    }
    if settings.connection.port == 0 {
        return Err(SettingsError::InvalidPort);
    }

    let audio = &settings.audio;
    if audio.parallel_generation.max_concurrency == 0 {
        return Err(SettingsError::InvalidConcurrency(0));
    }
    if !(8_000..=192_000).contains(&audio.synthesis_rate) {
        return Err(SettingsError::InvalidSynthesisRate(audio.synthesis_rate));
    }

    let split = &audio.split_settings;
    if !(0.0..=0.5).contains(&split.overlap_ratio) {
        return Err(SettingsError::InvalidOverlapRatio(split.overlap_ratio));
    }
    for (name, size) in [
        ("smallSize", split.small_size),
        ("mediumSize", split.medium_size),
        ("largeSize", split.large_size),
        ("punctuationMaxChunk", split.punctuation_max_chunk),
    ] {
        if size == 0 {
            return Err(SettingsError::InvalidChunkSize(name));
        }
    }

    if audio.player_command.first().is_none_or(|p| p.trim().is_empty()) {
        return Err(SettingsError::EmptyPlayerCommand);
    }

    Ok(())
}
