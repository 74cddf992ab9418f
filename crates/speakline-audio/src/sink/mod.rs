//! Audio sinks: WAV file output and external-player playback.

mod player;
mod wav_file;

use std::path::Path;

pub use player::CommandPlayerSink;
pub use wav_file::WavFileSink;

use speakline_core::{AudioSinkFactory, AudioSinkPort, SinkError};

/// Opens a [`WavFileSink`] when an output file is given, otherwise a
/// [`CommandPlayerSink`] running `player_command`.
#[derive(Debug, Clone)]
pub struct DefaultSinkFactory {
    player_command: Vec<String>,
}

impl DefaultSinkFactory {
    pub const fn new(player_command: Vec<String>) -> Self {
        Self { player_command }
    }
}

impl AudioSinkFactory for DefaultSinkFactory {
    fn open(&self, output_file: Option<&Path>) -> Result<Box<dyn AudioSinkPort>, SinkError> {
        match output_file {
            Some(path) => Ok(Box::new(WavFileSink::new(path))),
            None => Ok(Box::new(CommandPlayerSink::new(
                self.player_command.clone(),
            )?)),
        }
    }
}
