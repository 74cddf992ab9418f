//! CLI bootstrap: the composition root.
//!
//! Logging, settings and the concrete engine client are wired together here.
//! Handlers receive a [`CliContext`] and never load settings themselves.

use std::path::PathBuf;

use speakline_audio::{HttpSynthesizer, SpeechProcessor};
use speakline_core::Settings;
use speakline_queue::SpeechQueue;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Explicit settings file. `None` uses the default location.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            config_path: cli.config.clone(),
        }
    }
}

/// Fully composed context for CLI commands.
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Loaded, env-overridden and validated settings.
    pub settings: Settings,
    /// File the settings came from, if any.
    pub settings_path: Option<PathBuf>,
}

impl CliContext {
    /// HTTP client for the configured engine.
    pub fn synthesizer(&self) -> Result<HttpSynthesizer, CliError> {
        Ok(HttpSynthesizer::from_settings(&self.settings)?)
    }

    /// Speech queue playing through the configured player, using `settings`
    /// (the context's settings with any per-invocation overrides applied).
    pub fn speech_queue(&self, settings: Settings) -> Result<SpeechQueue, CliError> {
        let processor = SpeechProcessor::from_settings(settings)?;
        Ok(SpeechQueue::new(processor))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `verbose` selects `debug` and the default is
/// `info`. Output goes to stderr.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A subscriber may already be installed (tests); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Load settings and build the CLI context.
pub fn bootstrap(config: &CliConfig) -> Result<CliContext, CliError> {
    let settings_path = match &config.config_path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "settings file not found: {}",
                    path.display()
                )));
            }
            Some(path.clone())
        }
        None => Settings::default_path(),
    };

    let mut settings = match &settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_env()?;
    settings.validate()?;

    tracing::debug!(
        path = ?settings_path,
        engine = %settings.connection.base_url(),
        "Settings loaded"
    );

    Ok(CliContext {
        settings,
        settings_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_settings_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "voice": { "defaultStyleId": 7 }, "audio": { "splitMode": "small" } }"#,
        )
        .unwrap();

        let ctx = bootstrap(&CliConfig {
            config_path: Some(path.clone()),
        })
        .unwrap();

        assert_eq!(ctx.settings_path, Some(path));
        assert_eq!(ctx.settings.voice.default_style_id, 7);
        assert_eq!(ctx.settings.audio.split_mode, speakline_core::ChunkMode::Small);
    }

    #[test]
    fn missing_explicit_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = bootstrap(&CliConfig {
            config_path: Some(dir.path().join("absent.json")),
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "audio": { "parallelGeneration": { "maxConcurrency": 0 } } }"#,
        )
        .unwrap();

        let err = bootstrap(&CliConfig {
            config_path: Some(path),
        })
        .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn speech_queue_starts_idle() {
        let ctx = CliContext {
            settings: Settings::default(),
            settings_path: None,
        };
        let mut settings = ctx.settings.clone();
        settings.audio.parallel_generation.max_concurrency = 3;

        let queue = ctx.speech_queue(settings).unwrap();
        let status = queue.status();
        assert_eq!(status.queue_length, 0);
        assert!(!status.is_processing);
        assert_eq!(status.current_task_id, None);
    }
}
