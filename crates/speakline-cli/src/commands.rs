//! Commands enum and `say` arguments.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use speakline_core::{ChunkMode, SpeechOptions};

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Speak text (reads stdin when no text or input file is given)
    Say(SayArgs),

    /// Check that the synthesis engine is reachable
    Ping,
}

/// Arguments of `speakline say`.
#[derive(Debug, Clone, Default, Args)]
pub struct SayArgs {
    /// Text to speak; each argument is queued as its own utterance
    pub text: Vec<String>,

    /// Read text from a file ("-" reads stdin)
    #[arg(short = 'f', long = "input-file", conflicts_with = "text")]
    pub input_file: Option<PathBuf>,

    /// Write a WAV file instead of playing
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Speaker UUID
    #[arg(long)]
    pub voice: Option<String>,

    /// Style ID of the speaker
    #[arg(long)]
    pub style: Option<i32>,

    /// Speech rate in words per minute (200 = normal speed)
    #[arg(short = 'r', long)]
    pub rate: Option<u32>,

    /// Speed factor passed to the engine as-is (overrides --rate)
    #[arg(long)]
    pub factor: Option<f32>,

    /// How to split text: none, small, medium, large, punctuation
    #[arg(long = "chunk-mode")]
    pub chunk_mode: Option<ChunkMode>,

    /// Synthesize one chunk at a time with no look-ahead
    #[arg(long)]
    pub sequential: bool,

    /// Maximum concurrent synthesis requests
    #[arg(long = "max-concurrency")]
    pub max_concurrency: Option<usize>,

    /// Chunks to generate ahead of playback
    #[arg(long = "buffer-ahead")]
    pub buffer_ahead: Option<usize>,

    /// Player command reading WAV on stdin, e.g. "paplay"
    #[arg(long)]
    pub player: Option<String>,
}

impl SayArgs {
    /// Per-request options for the speech queue.
    pub fn speech_options(&self) -> SpeechOptions {
        SpeechOptions {
            voice: self.voice.clone(),
            style: self.style,
            rate: self.rate,
            factor: self.factor,
            output_file: self.output.clone(),
            chunk_mode: self.chunk_mode,
            parallel_generation: self.sequential.then_some(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Cli;
    use clap::Parser;

    fn say(args: &[&str]) -> SayArgs {
        let argv = ["speakline", "say"].iter().chain(args);
        match Cli::parse_from(argv).command {
            Some(Commands::Say(args)) => args,
            other => panic!("expected say, got {other:?}"),
        }
    }

    #[test]
    fn say_collects_options() {
        let args = say(&[
            "--voice",
            "abc",
            "--style",
            "3",
            "-r",
            "300",
            "--chunk-mode",
            "Small",
            "--sequential",
            "-o",
            "out.wav",
            "hello",
            "world",
        ]);

        assert_eq!(args.text, vec!["hello", "world"]);
        let options = args.speech_options();
        assert_eq!(options.voice.as_deref(), Some("abc"));
        assert_eq!(options.style, Some(3));
        assert_eq!(options.rate, Some(300));
        assert_eq!(options.chunk_mode, Some(ChunkMode::Small));
        assert_eq!(options.parallel_generation, Some(false));
        assert_eq!(options.output_file, Some(PathBuf::from("out.wav")));
    }

    #[test]
    fn parallel_is_left_to_settings_by_default() {
        let options = say(&["hi"]).speech_options();
        assert_eq!(options.parallel_generation, None);
        assert_eq!(options.chunk_mode, None);
    }

    #[test]
    fn input_file_excludes_text_arguments() {
        let args = say(&["-f", "speech.txt"]);
        assert_eq!(args.input_file, Some(PathBuf::from("speech.txt")));
        assert!(args.text.is_empty());

        let argv = ["speakline", "say", "--input-file", "speech.txt", "hello"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn unknown_chunk_mode_is_rejected() {
        let argv = ["speakline", "say", "--chunk-mode", "tiny", "x"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
