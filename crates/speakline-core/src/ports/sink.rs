use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::AudioResult;

/// Errors raised by audio sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing or spawning failed at the OS level.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A chunk's payload could not be decoded or does not match earlier chunks.
    #[error("Audio format error: {0}")]
    Format(String),

    /// The external player exited abnormally.
    #[error("Player error: {0}")]
    Player(String),
}

/// Destination for ordered chunk audio.
///
/// A sink is opened per request and receives chunks strictly in index order.
#[async_trait]
pub trait AudioSinkPort: Send {
    /// Accept the next chunk's audio.
    async fn consume(&mut self, result: AudioResult) -> Result<(), SinkError>;

    /// Flush and close after the last chunk.
    async fn finish(&mut self) -> Result<(), SinkError>;

    /// Stop output early, discarding anything not yet emitted.
    async fn abort(&mut self);
}

/// Opens a sink for one request.
pub trait AudioSinkFactory: Send + Sync {
    /// `output_file` selects file output; `None` means live playback.
    fn open(&self, output_file: Option<&Path>) -> Result<Box<dyn AudioSinkPort>, SinkError>;
}
